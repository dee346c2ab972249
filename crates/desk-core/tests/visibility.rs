//! Role-driven visibility across reads, listings, and aggregates.

mod support;

use desk_core::ErrorCode;
use desk_core::model::{Caller, EntityRef, NewTicket, UserRef};
use desk_core::query::ListRequest;

use support::{Harness, admin, caller, customer};

async fn seed(h: &Harness) -> Vec<String> {
    let mut ids = Vec::new();
    let specs = [
        ("cust-1", Some("agent-1"), None),
        ("cust-1", None, Some("g-net")),
        ("cust-2", Some("agent-1"), Some("g-db")),
        ("cust-2", None, None),
    ];
    for (i, (creator, technician, group)) in specs.into_iter().enumerate() {
        let ticket = h
            .service
            .create_ticket(
                &customer(creator),
                NewTicket {
                    template_id: "default".into(),
                    name: format!("ticket {i}"),
                    technician: technician.map(UserRef::new),
                    group: group.map(EntityRef::new),
                    ..NewTicket::default()
                },
            )
            .await
            .unwrap();
        ids.push(ticket.id);
    }
    ids
}

async fn visible_numbers(h: &Harness, who: &Caller) -> Vec<u64> {
    let mut numbers: Vec<u64> = h
        .service
        .list(who, &ListRequest::default())
        .await
        .unwrap()
        .items
        .iter()
        .map(|t| t.number)
        .collect();
    numbers.sort_unstable();
    numbers
}

#[tokio::test]
async fn customers_see_their_own_tickets() {
    let h = Harness::new().await;
    seed(&h).await;
    assert_eq!(visible_numbers(&h, &customer("cust-1")).await, vec![1, 2]);
    assert_eq!(visible_numbers(&h, &customer("cust-2")).await, vec![3, 4]);
}

#[tokio::test]
async fn requester_counts_as_owner() {
    let h = Harness::new().await;
    let ticket = h
        .service
        .create_ticket(
            &admin(),
            NewTicket {
                template_id: "default".into(),
                name: "On behalf".into(),
                requester: Some(UserRef::new("cust-9")),
                ..NewTicket::default()
            },
        )
        .await
        .unwrap();
    let seen = h.service.get_ticket(&customer("cust-9"), &ticket.id).await.unwrap();
    assert_eq!(seen.id, ticket.id);
}

#[tokio::test]
async fn level_one_sees_assigned_tickets() {
    let h = Harness::new().await;
    seed(&h).await;
    assert_eq!(visible_numbers(&h, &caller("agent-1", &["L1"])).await, vec![1, 3]);
}

#[tokio::test]
async fn level_two_sees_group_tickets() {
    let h = Harness::new().await;
    seed(&h).await;
    assert_eq!(visible_numbers(&h, &caller("agent-2", &["L2"])).await, vec![2]);
}

#[tokio::test]
async fn level_two_without_groups_sees_nothing() {
    let h = Harness::new().await;
    seed(&h).await;
    assert!(visible_numbers(&h, &caller("agent-3", &["L2"])).await.is_empty());
}

#[tokio::test]
async fn admins_see_the_whole_tenant_only() {
    let h = Harness::new().await;
    seed(&h).await;
    assert_eq!(visible_numbers(&h, &admin()).await, vec![1, 2, 3, 4]);

    let elsewhere = Caller::new("globex", "admin-1", ["TA"]);
    assert!(visible_numbers(&h, &elsewhere).await.is_empty());
}

#[tokio::test]
async fn customer_with_all_ticket_flag_sees_everything() {
    let h = Harness::new().await;
    seed(&h).await;
    let who = caller("cust-1", &["buyers", "auditors"]);
    assert_eq!(visible_numbers(&h, &who).await, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn missing_view_permission_hides_everything() {
    let h = Harness::new().await;
    let ids = seed(&h).await;
    let who = caller("agent-1", &["blind"]);
    assert!(visible_numbers(&h, &who).await.is_empty());

    let err = h.service.get_ticket(&who, &ids[0]).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::TicketNotFound);

    let facets = h.service.statistics(&who, &ListRequest::default()).await.unwrap();
    assert_eq!(facets.total, 0);
}

#[tokio::test]
async fn invisible_ticket_reads_as_not_found() {
    let h = Harness::new().await;
    let ids = seed(&h).await;
    let who = customer("cust-2");

    let err = h.service.get_ticket(&who, &ids[0]).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::TicketNotFound);

    let err = h.service.update_status(&who, &ids[0], "closed").await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::TicketNotFound);
}

#[tokio::test]
async fn query_cannot_widen_visibility() {
    let h = Harness::new().await;
    seed(&h).await;
    let page = h
        .service
        .list(
            &customer("cust-1"),
            &ListRequest {
                query: Some("creator = cust-2 OR number >= 1".into()),
                ..ListRequest::default()
            },
        )
        .await
        .unwrap();
    assert!(page.items.iter().all(|t| t.creator.id == "cust-1"));
    assert_eq!(page.total, 2);
}
