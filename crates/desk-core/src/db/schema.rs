//! SQLite document schema for the ticket store.
//!
//! Tickets and workflows are stored whole as JSON documents in `doc`.
//! The few columns next to `doc` exist for keys and indexes; every other
//! predicate reads the document through `json_extract`.

/// Migration v1: document tables, number sequences, store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS tickets (
    ticket_id TEXT PRIMARY KEY,
    tenant TEXT NOT NULL,
    number INTEGER NOT NULL,
    created_ms INTEGER NOT NULL,
    doc TEXT NOT NULL CHECK (json_valid(doc)),
    UNIQUE (tenant, number),
    CHECK (ticket_id LIKE 'tk-%')
);

CREATE TABLE IF NOT EXISTS workflows (
    workflow_id TEXT NOT NULL,
    tenant TEXT NOT NULL DEFAULT '',
    doc TEXT NOT NULL CHECK (json_valid(doc)),
    PRIMARY KEY (tenant, workflow_id)
);

CREATE TABLE IF NOT EXISTS sequences (
    key TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 1);
";

/// Migration v2: read-path indexes for listings and the incident cascade.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_tickets_tenant_number
    ON tickets(tenant, number DESC);

CREATE INDEX IF NOT EXISTS idx_tickets_tenant_created
    ON tickets(tenant, created_ms DESC);

CREATE INDEX IF NOT EXISTS idx_tickets_tenant_status
    ON tickets(tenant, json_extract(doc, '$.status.id'));

UPDATE store_meta SET schema_version = 2 WHERE id = 1;
";

/// Indexes the listing paths rely on.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_tickets_tenant_number",
    "idx_tickets_tenant_created",
    "idx_tickets_tenant_status",
];
