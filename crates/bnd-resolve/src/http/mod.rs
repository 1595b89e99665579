//! URL connectors used to fetch indexes and artifacts.

mod connector;

pub use connector::{FetchResponse, HttpConnector, HttpConnectorConfig, HttpError, OfflineConnector, UrlConnector};
