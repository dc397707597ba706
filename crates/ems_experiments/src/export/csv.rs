use crate::metrics::SimulationResult;
use crate::runner::ReplicationOutput;

/// `to_incident:60000;at_incident:600000`
fn format_events(record: &ems_core::model::CaseRecord) -> String {
    record
        .event_history
        .iter()
        .map(|event| format!("{}:{}", event.event_type, event.duration))
        .collect::<Vec<_>>()
        .join(";")
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub(crate) fn export_records_impl(
    outputs: &[ReplicationOutput],
    file: std::fs::File,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut wtr = csv::Writer::from_writer(file);

    wtr.write_record([
        "replication",
        "case_id",
        "latitude",
        "longitude",
        "arrival_ms",
        "priority",
        "ambulance",
        "delay_ms",
        "times_queued",
        "assigned_at_ms",
        "finished_at_ms",
        "response_ms",
        "service_ms",
        "events",
    ])?;

    for output in outputs {
        for record in &output.records {
            wtr.write_record([
                &output.replication.to_string(),
                &record.case.id.to_string(),
                &record.case.location.latitude.to_string(),
                &record.case.location.longitude.to_string(),
                &record.case.datetime.to_string(),
                &record.case.priority.to_string(),
                &record.ambulance.to_string(),
                &record.delay.to_string(),
                &record.case.times_queued.to_string(),
                &record.assigned_at.to_string(),
                &optional(record.finished_at),
                &optional(record.response_time()),
                &optional(record.service_time()),
                &format_events(record),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

pub(crate) fn export_results_impl(
    results: &[SimulationResult],
    file: std::fs::File,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut wtr = csv::Writer::from_writer(file);
    for result in results {
        wtr.serialize(result)?;
    }
    wtr.flush()?;
    Ok(())
}
