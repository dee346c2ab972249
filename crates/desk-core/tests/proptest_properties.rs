//! Property tests for workflow resolution, access compilation, and link sets.

mod support;

use chrono::Utc;
use proptest::prelude::*;

use desk_core::access::{AccessInput, Predicate, compile_access};
use desk_core::model::{
    AdvancedViewPermission, Connect, LinkKind, RequestPermission, Role, RoleKind, TemplateRef,
    Ticket, UserRef,
};
use desk_core::workflow::{
    Edge, NodeKind, Workflow, WorkflowKind, default_status, possible_statuses,
};

const STATUS_POOL: [&str; 4] = ["open", "pending", "solved", "closed"];

fn arb_workflow() -> impl Strategy<Value = Workflow> {
    (1_usize..7)
        .prop_flat_map(|n| {
            (
                proptest::collection::vec(proptest::option::weighted(0.8, 0..STATUS_POOL.len()), n),
                proptest::collection::vec((0..=n, 1..=n), 0..(n * 3)),
            )
        })
        .prop_map(|(statuses, edges)| {
            let mut nodes = vec![support::node("start", NodeKind::Start, None)];
            for (i, status) in statuses.iter().enumerate() {
                nodes.push(support::node(
                    &format!("n{}", i + 1),
                    NodeKind::Normal,
                    status.map(|s| STATUS_POOL[s]),
                ));
            }
            let edges = edges
                .into_iter()
                .map(|(source, target)| Edge {
                    id: None,
                    source: nodes[source].id.clone(),
                    target: nodes[target].id.clone(),
                })
                .collect();
            Workflow {
                id: "wf".into(),
                tenant: None,
                kind: WorkflowKind::Custom,
                nodes,
                edges,
            }
        })
}

fn arb_role() -> impl Strategy<Value = Role> {
    (
        prop_oneof![Just("SA"), Just("TA"), Just("L1"), Just("L2"), Just("EU"), Just("custom")],
        prop_oneof![
            Just(RoleKind::Customer),
            Just(RoleKind::Employee),
            Just(RoleKind::Default)
        ],
        any::<bool>(),
        any::<(bool, bool, bool)>(),
    )
        .prop_map(|(id, kind, add, (all, group, technician))| Role {
            id: id.into(),
            kind,
            request_permission: RequestPermission { view: false, add },
            advanced_view_permission: AdvancedViewPermission {
                all_ticket: all,
                group_ticket: group,
                technician_ticket: technician,
            },
        })
}

fn ticket(number: u64, creator: &str, group: Option<&str>) -> Ticket {
    Ticket {
        id: format!("tk-{number:012}"),
        tenant: support::TENANT.into(),
        number,
        name: format!("ticket {number}"),
        description: None,
        status: None,
        workflow: support::support_flow("default"),
        template: TemplateRef {
            id: "default".into(),
            name: "Default".into(),
        },
        creator: UserRef::new(creator),
        requester: UserRef::new(creator),
        technician: None,
        group: group.map(desk_core::model::EntityRef::new),
        department: None,
        service: None,
        ticket_type: None,
        priority: None,
        response_overdue: false,
        resolve_overdue: false,
        overdue_time: None,
        resolution: None,
        connect: Connect::default(),
        activities: Vec::new(),
        created_time: Utc::now(),
    }
}

proptest! {
    #[test]
    fn default_status_follows_first_start_edge(workflow in arb_workflow()) {
        let expected = workflow
            .edges
            .iter()
            .find(|e| e.source == "start")
            .and_then(|e| workflow.node(&e.target))
            .and_then(|n| n.status.as_ref())
            .map(|s| s.id.clone());
        prop_assert_eq!(default_status(&workflow).map(|s| s.id), expected);

        let mut cut = workflow;
        cut.edges.retain(|e| e.source != "start");
        prop_assert!(default_status(&cut).is_none());
    }

    #[test]
    fn possible_statuses_start_with_current_and_never_repeat(
        workflow in arb_workflow(),
        pick in 0..STATUS_POOL.len(),
    ) {
        let current = STATUS_POOL[pick];
        let statuses = possible_statuses(&workflow, Some(current));
        if workflow.node_with_status(current).is_none() {
            prop_assert!(statuses.is_empty());
        } else {
            prop_assert_eq!(statuses[0].id.as_str(), current);
        }
        let mut ids: Vec<&str> = statuses.iter().map(|s| s.id.as_str()).collect();
        let before = ids.len();
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), before);
    }

    #[test]
    fn creation_statuses_cover_every_status_once(workflow in arb_workflow()) {
        let statuses = possible_statuses(&workflow, None);
        for node in &workflow.nodes {
            if let Some(status) = &node.status {
                prop_assert_eq!(statuses.iter().filter(|s| s.id == status.id).count(), 1);
            }
        }
    }

    #[test]
    fn view_gate_dominates_every_other_flag(
        roles in proptest::collection::vec(arb_role(), 0..5),
        groups in proptest::collection::vec("g-[a-c]", 0..3),
    ) {
        let predicate = compile_access(AccessInput {
            roles: &roles,
            user_id: "u-1",
            group_ids: &groups,
        });
        prop_assert_eq!(&predicate, &Predicate::Nothing);
        prop_assert!(!predicate.matches(&ticket(1, "u-1", Some("g-a"))));
    }

    #[test]
    fn customer_with_all_ticket_sees_any_creator(creator in "u-[0-9]{1,3}") {
        let customer = support::role(
            "buyers",
            RoleKind::Customer,
            true,
            true,
            AdvancedViewPermission::default(),
        );
        let auditor = support::role(
            "auditors",
            RoleKind::Customer,
            false,
            false,
            AdvancedViewPermission { all_ticket: true, ..AdvancedViewPermission::default() },
        );
        let predicate = compile_access(AccessInput {
            roles: &[customer, auditor],
            user_id: "viewer",
            group_ids: &[],
        });
        prop_assert!(matches!(predicate, Predicate::Or(_)));
        prop_assert!(predicate.matches(&ticket(7, &creator, None)));
    }

    #[test]
    fn connect_add_is_idempotent(ids in proptest::collection::vec("tk-[a-d]", 0..8)) {
        let mut connect = Connect::default();
        let first = connect.add(LinkKind::Requests, &ids);
        let snapshot = connect.clone();
        let second = connect.add(LinkKind::Requests, &ids);

        prop_assert!(second.is_empty());
        prop_assert_eq!(&connect, &snapshot);
        prop_assert_eq!(first.len(), connect.requests.len());

        let mut unique = connect.requests.clone();
        unique.sort();
        unique.dedup();
        prop_assert_eq!(unique.len(), connect.requests.len());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn deleted_incident_leaves_no_references(
        assignments in proptest::collection::vec(
            proptest::collection::btree_set(0_usize..4, 0..4),
            1..5,
        ),
    ) {
        let runtime = tokio::runtime::Runtime::new().expect("runtime");
        runtime.block_on(async {
            let h = support::Harness::new().await;
            let who = support::customer("cust-1");
            let mut tickets = Vec::new();
            for (i, incidents) in assignments.iter().enumerate() {
                let ticket = h.create(&who, &format!("t{i}")).await;
                let ids: Vec<String> = incidents.iter().map(|n| format!("inc-{n}")).collect();
                h.links.link_incidents(&who, &ticket.id, &ids).await.expect("link");
                tickets.push((ticket.id, ids));
            }

            let mut touched = h
                .links
                .on_incident_deleted(support::TENANT, &["inc-0".to_string()])
                .await
                .expect("cascade");
            touched.sort();

            let mut expected: Vec<String> = tickets
                .iter()
                .filter(|(_, ids)| ids.iter().any(|id| id == "inc-0"))
                .map(|(id, _)| id.clone())
                .collect();
            expected.sort();
            assert_eq!(touched, expected);

            for (id, before) in &tickets {
                let now = h.service.get_ticket(&who, id).await.expect("ticket");
                let remaining: Vec<String> =
                    before.iter().filter(|i| *i != "inc-0").cloned().collect();
                assert_eq!(now.connect.incidents, remaining);
            }
        });
    }
}
