mod credentials;

pub use credentials::BasicCredentials;
