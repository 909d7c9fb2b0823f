pub mod core {
    pub mod config;
    pub mod error;
    pub mod startup;
    pub mod state;
    pub mod tracing_init;
}

pub mod auth {
    pub mod service;
}

pub mod models {
    pub mod outcome;
    pub mod pointer;
    pub mod session;
    pub mod user;
}

pub mod stores {
    pub mod credential_store;
    pub mod file_store;
    pub mod memory_store;
    pub mod record_store;
    pub mod session_store;
}

pub mod rbac {
    pub mod evaluator;
    pub mod pages;
    pub mod permission;
    pub mod role;
}

pub mod security {
    pub mod password;
}

pub mod validation {
    pub mod account;
}

pub mod metrics {
    pub mod collector;
}

pub mod utils {
    pub mod id;
    pub mod time;
}
