#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{Config, ConfigFairing, StoreFairing};
use crate::logging::LoggerFairing;
use crate::model::store::StoreHandle;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

/// Build the server, loading its config and connecting to MongoDB on ignition.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(StoreFairing)
}

/// Build the server around an existing store and config.
pub fn rocket_for_store(db: StoreHandle, config: Config) -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(LoggerFairing)
        .manage(config)
        .manage(db)
}
