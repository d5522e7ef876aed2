//! Raw data export

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use vanno_common::events::{
    is_identifier_key, record_video_id, DATE_KEY, TIMESTAMP_KEY, USERNAME_KEY, VIDEO_ID_KEY,
};
use vanno_common::RawRecord;

use crate::access::{assert_role_not, Role, Viewer, HOME_LOCATION};
use crate::error::ApiError;
use crate::AppState;

/// GET /api/export
///
/// Every stored rating as CSV: identifier columns, then every measured
/// variable in first-seen order, then the date.
pub async fn export_csv(
    State(state): State<AppState>,
    viewer: Viewer,
) -> Result<Response, ApiError> {
    assert_role_not(viewer.role, Role::User, HOME_LOCATION)?;

    let records = state.active_store().await.fetch_all().await?;
    let body = records_to_csv(&records)
        .map_err(|e| vanno_common::Error::Internal(format!("CSV export failed: {}", e)))?;
    let filename = format!(
        "vanno_ratings_{}.csv",
        chrono::Local::now().format("%Y-%m-%d_%H%M%S")
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response())
}

/// GET /api/export/json
pub async fn export_json(
    State(state): State<AppState>,
    viewer: Viewer,
) -> Result<Json<Value>, ApiError> {
    assert_role_not(viewer.role, Role::User, HOME_LOCATION)?;

    let records = state.active_store().await.fetch_all().await?;
    Ok(Json(json!({ "objects": records })))
}

/// Render documents as CSV with a canonical header
pub fn records_to_csv(records: &[RawRecord]) -> csv::Result<Vec<u8>> {
    let mut variables: Vec<&str> = Vec::new();
    for key in records.iter().flat_map(|r| r.keys()) {
        if !is_identifier_key(key) && !variables.contains(&key.as_str()) {
            variables.push(key);
        }
    }

    let mut columns: Vec<&str> = vec![VIDEO_ID_KEY, USERNAME_KEY, TIMESTAMP_KEY];
    columns.extend(&variables);
    columns.push(DATE_KEY);

    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(&columns)?;

    for record in records {
        let mut fields = Vec::with_capacity(columns.len());
        fields.push(record_video_id(record).unwrap_or_default());
        for key in &columns[1..] {
            fields.push(cell_text(record.get(*key)));
        }
        wtr.write_record(&fields)?;
    }

    wtr.into_inner().map_err(|e| e.into_error().into())
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_csv_layout() {
        let records = vec![
            record(json!({"video_id": "42", "username": "a", "timestamp": 1.5, "value": 60, "date": "2018-05-04"})),
            record(json!({"videoid": 7, "username": "b, c", "timestamp": 2, "value2": "say \"hi\""})),
        ];

        let csv = String::from_utf8(records_to_csv(&records).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "video_id,username,timestamp,value,value2,date");
        assert_eq!(lines[1], "42,a,1.5,60,,2018-05-04");
        assert_eq!(lines[2], "7,\"b, c\",2,,\"say \"\"hi\"\"\",");
    }

    #[test]
    fn test_multiline_cell_stays_one_record() {
        let records = vec![record(
            json!({"video_id": "1", "username": "a", "timestamp": 0, "value": "two\nlines"}),
        )];
        let bytes = records_to_csv(&records).unwrap();

        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][3], "two\nlines");
    }

    #[test]
    fn test_empty_export_has_header_only() {
        let csv = String::from_utf8(records_to_csv(&[]).unwrap()).unwrap();
        assert_eq!(
            csv.lines().collect::<Vec<_>>(),
            vec!["video_id,username,timestamp,date"]
        );
    }
}
