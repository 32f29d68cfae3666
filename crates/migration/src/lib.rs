pub use sea_orm_migration::prelude::*;

mod m20250818_000001_create_monitor_tables;
mod m20250818_000002_create_incident_tables;
mod m20250902_120000_create_slo_tables;
mod m20251011_090000_create_group_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250818_000001_create_monitor_tables::Migration),
            Box::new(m20250818_000002_create_incident_tables::Migration),
            Box::new(m20250902_120000_create_slo_tables::Migration),
            Box::new(m20251011_090000_create_group_tables::Migration),
        ]
    }
}
