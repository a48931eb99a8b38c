pub mod config;
pub mod error;
pub mod state;
pub mod db;

pub mod crypto {
    pub mod aes;
    pub mod kdf;
    pub mod vault;
}

pub mod models {
    pub mod account;
    pub mod document;
    pub mod session;
    pub mod wire;
}

pub mod repositories {
    pub mod account;
    pub mod session;
}

pub mod services {
    pub mod backup;
    pub mod session;
}

pub mod handlers {
    pub mod backup;
    pub mod session;
}

pub mod middleware_layer {
    pub mod rate_limit;
}

pub mod validation {
    pub mod auth;
    pub mod username;
}

pub mod client;
