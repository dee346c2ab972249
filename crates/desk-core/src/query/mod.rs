//! Ticket query composition: parsing, coarse filters, sort, and paging.

pub mod builder;
pub mod filter;
pub mod page;
pub mod parser;
pub mod sort;

pub use builder::{ListRequest, TicketQuery, TicketQueryBuilder, build_query};
pub use filter::{DateRange, TicketFilter};
pub use page::{DEFAULT_MAX_PAGE_SIZE, DEFAULT_PAGE_SIZE, Page, Paging, QueryPurpose, UNPAGED};
pub use parser::{MAX_QUERY_DEPTH, parse_query};
pub use sort::{Direction, SortKey, parse_sort};
