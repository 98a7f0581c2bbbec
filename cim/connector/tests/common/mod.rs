//! Shared fixtures for the connector integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use cim_connector::prelude::*;

/// Number of elements in `tests/data/grid.rdf`
pub const GRID_ELEMENTS: i64 = 15;

/// Energy consumers in `tests/data/grid.rdf`
pub const GRID_CONSUMERS: usize = 2;

pub const CONSUMER_QUERY: &str = "select s.sup.sup.sup.sup.mRID mRID, s.sup.sup.sup.sup.aliasName aliasName, \
     s.sup.sup.sup.sup.name name, s.sup.sup.sup.sup.description description, p.xPosition, p.yPosition \
     from EnergyConsumer s, PositionPoint p \
     where s.sup.sup.sup.Location = p.Location and p.sequenceNumber = 0 \
     order by name";

pub fn data_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

pub fn grid_file() -> String {
    data_path("grid.rdf").display().to_string()
}

pub fn read_input(filename: &str) -> MappedRecord {
    MappedRecord::new(MappedRecord::INPUT).with("filename", filename)
}

pub fn query_input(filename: &str, query: &str) -> MappedRecord {
    MappedRecord::new(MappedRecord::INPUT)
        .with("filename", filename)
        .with("query", query)
}

/// Run a query on a fresh interaction and return its cursor
pub async fn query(connection: &Connection, query: &str) -> cim_connector::Result<ResultSet> {
    let mut interaction = connection.create_interaction()?;
    let result = interaction
        .execute(&InteractionSpec::get_data_frame(), &query_input(&grid_file(), query))
        .await
        .and_then(Record::into_result_set);
    interaction.close();

    result
}
