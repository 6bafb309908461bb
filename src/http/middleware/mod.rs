pub mod asn_block;

pub use asn_block::{asn_filter_middleware, protect, ClientAsn};
