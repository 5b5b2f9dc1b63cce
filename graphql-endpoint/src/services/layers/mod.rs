//! Helpers the endpoint service is assembled from.

pub(crate) mod content_negotiation;
pub(crate) mod static_page;
