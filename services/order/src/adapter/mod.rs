pub mod datastore;
pub mod gateway;
