// CSV persistence for rule tables. Tables are replaced wholesale: the new
// table is written to a temp file next to the target and renamed over it, so
// a failed run never leaves a half-written table behind.

use anyhow::{Context, Result};
use border_topology::ResolveError;
use border_topology::models::RuleTable;
use std::path::Path;

const HEADER: [&str; 9] = [
    "route_id",
    "start_measure",
    "end_measure",
    "left_boundary_id",
    "right_boundary_id",
    "geometry_kind",
    "effective_from",
    "effective_to",
    "process_date",
];

pub fn write_rule_table(table: &RuleTable, path: &Path) -> Result<()> {
    if path.is_dir() {
        return Err(ResolveError::SchemaConflict(format!(
            "{} already exists and is not a rule table file",
            path.display()
        ))
        .into());
    }

    let tmp = path.with_extension("csv.tmp");
    let mut wtr = csv::Writer::from_path(&tmp)
        .with_context(|| format!("Failed to create {}", tmp.display()))?;
    wtr.write_record(HEADER)?;
    for record in &table.records {
        wtr.write_record([
            record.route_id.clone(),
            format!("{:.3}", record.start_measure),
            format!("{:.3}", record.end_measure),
            record.left_boundary_id.clone(),
            record.right_boundary_id.clone(),
            record.geometry_kind.as_str().to_string(),
            record.effective_from.map(|d| d.to_string()).unwrap_or_default(),
            record.effective_to.map(|d| d.to_string()).unwrap_or_default(),
            table.process_date.to_string(),
        ])?;
    }
    wtr.flush()?;
    drop(wtr);

    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move rule table into {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use border_topology::models::{GeometryKind, TopologyRecord};
    use chrono::NaiveDate;

    fn sample_table() -> RuleTable {
        RuleTable {
            layer: "counties".into(),
            process_date: NaiveDate::from_ymd_opt(2026, 8, 30).unwrap(),
            records: vec![TopologyRecord {
                route_id: "I15".into(),
                start_measure: 4.5,
                end_measure: 15.5,
                left_boundary_id: "A".into(),
                right_boundary_id: "B".into(),
                geometry_kind: GeometryKind::Line,
                effective_from: NaiveDate::from_ymd_opt(2020, 1, 1),
                effective_to: None,
            }],
        }
    }

    #[test]
    fn test_write_and_replace_rule_table() {
        let dir = std::env::temp_dir().join("border_topology_writer_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("counties_route_border_rule_table.csv");

        write_rule_table(&sample_table(), &path).unwrap();
        let first = std::fs::read_to_string(&path).unwrap();
        assert!(first.starts_with("route_id,start_measure,end_measure"));
        assert!(first.contains("I15,4.500,15.500,A,B,line,2020-01-01,,2026-08-30"));

        // a second run overwrites, never appends
        write_rule_table(&sample_table(), &path).unwrap();
        let second = std::fs::read_to_string(&path).unwrap();
        assert_eq!(first, second);
        assert!(!path.with_extension("csv.tmp").exists());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_directory_target_is_a_schema_conflict() {
        let dir = std::env::temp_dir().join("border_topology_writer_conflict");
        std::fs::create_dir_all(&dir).unwrap();
        let err = write_rule_table(&sample_table(), &dir).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ResolveError>(),
            Some(ResolveError::SchemaConflict(_))
        ));
    }
}
