//! Export package codec shared by checkpoints and the base station.
//!
//! A package is a versioned JSON envelope:
//!
//! ```json
//! { "version": "1.0", "exportType": "checkpoint-results", "exportedAt": "...",
//!   "data": { "raceId": "...", "checkpointNumber": 2, "runners": [ ... ] } }
//! ```
//!
//! Decoding is all-or-nothing: any structural defect rejects the package.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::models::{RaceId, RunnerStatus, SightingRecord};
use crate::util::{compact_text, normalize_text_option, truncate_to_ms};

/// Version written by this build
pub const FORMAT_VERSION: &str = "1.0";

/// Versions this build can read
pub const SUPPORTED_VERSIONS: &[&str] = &[FORMAT_VERSION];

/// Tag identifying the payload shape of a package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportType {
    CheckpointResults,
    RaceResults,
}

impl ExportType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CheckpointResults => "checkpoint-results",
            Self::RaceResults => "race-results",
        }
    }
}

impl fmt::Display for ExportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportType {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "checkpoint-results" => Ok(Self::CheckpointResults),
            "race-results" => Ok(Self::RaceResults),
            other => Err(DecodeError::UnknownExportType(other.to_string())),
        }
    }
}

/// One runner line inside a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RunnerEntry {
    pub number: u32,
    pub status: RunnerStatus,
    pub mark_off_time: Option<DateTime<Utc>>,
    pub call_in_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub called_in: bool,
    pub notes: Option<String>,
}

impl RunnerEntry {
    fn from_record(record: &SightingRecord) -> Self {
        Self {
            number: record.runner_number,
            status: record.status,
            mark_off_time: record.mark_off_time,
            call_in_time: record.call_in_time,
            called_in: record.called_in,
            notes: record.notes.clone(),
        }
    }

    fn into_record(self, race_id: RaceId, checkpoint_number: u32) -> SightingRecord {
        SightingRecord {
            race_id,
            checkpoint_number,
            runner_number: self.number,
            status: self.status,
            mark_off_time: self.mark_off_time.map(truncate_to_ms),
            call_in_time: self.call_in_time.map(truncate_to_ms),
            called_in: self.called_in,
            notes: normalize_text_option(self.notes),
        }
    }
}

/// Payload of a `checkpoint-results` package: one checkpoint's full state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CheckpointResults {
    pub race_id: RaceId,
    pub checkpoint_number: u32,
    pub runners: Vec<RunnerEntry>,
}

impl CheckpointResults {
    /// Sightings carried by this payload, in package order
    #[must_use]
    pub fn sightings(&self) -> Vec<SightingRecord> {
        self.runners
            .iter()
            .cloned()
            .map(|entry| entry.into_record(self.race_id.clone(), self.checkpoint_number))
            .collect()
    }
}

/// Payload of a `race-results` package: consolidated records for every checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RaceResults {
    pub race_id: RaceId,
    pub checkpoints: Vec<CheckpointGroup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CheckpointGroup {
    pub checkpoint_number: u32,
    pub runners: Vec<RunnerEntry>,
}

/// Package contents, one variant per export type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportPayload {
    CheckpointResults(CheckpointResults),
    RaceResults(RaceResults),
}

impl ExportPayload {
    #[must_use]
    pub const fn export_type(&self) -> ExportType {
        match self {
            Self::CheckpointResults(_) => ExportType::CheckpointResults,
            Self::RaceResults(_) => ExportType::RaceResults,
        }
    }

    #[must_use]
    pub const fn race_id(&self) -> &RaceId {
        match self {
            Self::CheckpointResults(results) => &results.race_id,
            Self::RaceResults(results) => &results.race_id,
        }
    }

    /// Sightings grouped by checkpoint number
    #[must_use]
    pub fn sightings_by_checkpoint(&self) -> BTreeMap<u32, Vec<SightingRecord>> {
        match self {
            Self::CheckpointResults(results) => {
                BTreeMap::from([(results.checkpoint_number, results.sightings())])
            }
            Self::RaceResults(results) => results
                .checkpoints
                .iter()
                .map(|group| {
                    let sightings = group
                        .runners
                        .iter()
                        .cloned()
                        .map(|entry| {
                            entry.into_record(results.race_id.clone(), group.checkpoint_number)
                        })
                        .collect();
                    (group.checkpoint_number, sightings)
                })
                .collect(),
        }
    }
}

/// Immutable transport envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPackage {
    pub version: String,
    pub exported_at: Option<DateTime<Utc>>,
    pub payload: ExportPayload,
}

impl ExportPackage {
    #[must_use]
    pub const fn export_type(&self) -> ExportType {
        self.payload.export_type()
    }

    #[must_use]
    pub const fn race_id(&self) -> &RaceId {
        self.payload.race_id()
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        let data = match &self.payload {
            ExportPayload::CheckpointResults(results) => serde_json::to_value(results)?,
            ExportPayload::RaceResults(results) => serde_json::to_value(results)?,
        };
        let envelope = Envelope {
            version: self.version.clone(),
            export_type: self.export_type().as_str().to_string(),
            exported_at: self.exported_at,
            data,
        };
        serde_json::to_string_pretty(&envelope)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    version: String,
    export_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exported_at: Option<DateTime<Utc>>,
    data: serde_json::Value,
}

/// Wrap a checkpoint's full current sighting set.
///
/// Deleted records must already be filtered out. Records of other races or
/// checkpoints are skipped.
#[must_use]
pub fn encode_checkpoint(
    race_id: &RaceId,
    checkpoint_number: u32,
    records: &[SightingRecord],
) -> ExportPackage {
    let mut runners = records
        .iter()
        .filter(|record| record.race_id == *race_id && record.checkpoint_number == checkpoint_number)
        .map(RunnerEntry::from_record)
        .collect::<Vec<_>>();
    runners.sort_by_key(|entry| entry.number);

    ExportPackage {
        version: FORMAT_VERSION.to_string(),
        exported_at: Some(Utc::now()),
        payload: ExportPayload::CheckpointResults(CheckpointResults {
            race_id: race_id.clone(),
            checkpoint_number,
            runners,
        }),
    }
}

/// Wrap the base station's consolidated records for a whole race
#[must_use]
pub fn encode_race(race_id: &RaceId, records: &[SightingRecord]) -> ExportPackage {
    let mut groups: BTreeMap<u32, Vec<RunnerEntry>> = BTreeMap::new();
    for record in records.iter().filter(|record| record.race_id == *race_id) {
        groups
            .entry(record.checkpoint_number)
            .or_default()
            .push(RunnerEntry::from_record(record));
    }

    let checkpoints = groups
        .into_iter()
        .map(|(checkpoint_number, mut runners)| {
            runners.sort_by_key(|entry| entry.number);
            CheckpointGroup {
                checkpoint_number,
                runners,
            }
        })
        .collect();

    ExportPackage {
        version: FORMAT_VERSION.to_string(),
        exported_at: Some(Utc::now()),
        payload: ExportPayload::RaceResults(RaceResults {
            race_id: race_id.clone(),
            checkpoints,
        }),
    }
}

/// Validate and parse a received package
pub fn decode(bytes: &[u8]) -> Result<ExportPackage, DecodeError> {
    let envelope: Envelope = serde_json::from_slice(bytes)
        .map_err(|error| DecodeError::MalformedPayload(compact_text(&error.to_string())))?;

    if !SUPPORTED_VERSIONS.contains(&envelope.version.as_str()) {
        return Err(DecodeError::UnsupportedVersion(envelope.version));
    }

    let export_type = envelope.export_type.parse::<ExportType>()?;
    let payload = match export_type {
        ExportType::CheckpointResults => {
            let results: CheckpointResults = parse_data(envelope.data)?;
            validate_checkpoint(results.checkpoint_number, &results.runners)?;
            ExportPayload::CheckpointResults(results)
        }
        ExportType::RaceResults => {
            let results: RaceResults = parse_data(envelope.data)?;
            let mut seen = HashSet::new();
            for group in &results.checkpoints {
                if !seen.insert(group.checkpoint_number) {
                    return Err(DecodeError::MalformedPayload(format!(
                        "checkpoint {} appears more than once",
                        group.checkpoint_number
                    )));
                }
                validate_checkpoint(group.checkpoint_number, &group.runners)?;
            }
            ExportPayload::RaceResults(results)
        }
    };

    Ok(ExportPackage {
        version: envelope.version,
        exported_at: envelope.exported_at,
        payload,
    })
}

fn parse_data<T: serde::de::DeserializeOwned>(data: serde_json::Value) -> Result<T, DecodeError> {
    serde_json::from_value(data)
        .map_err(|error| DecodeError::MalformedPayload(compact_text(&error.to_string())))
}

fn validate_checkpoint(checkpoint_number: u32, runners: &[RunnerEntry]) -> Result<(), DecodeError> {
    if checkpoint_number == 0 {
        return Err(DecodeError::MalformedPayload(
            "checkpoint number must be positive".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for runner in runners {
        if runner.number == 0 {
            return Err(DecodeError::MalformedPayload(format!(
                "checkpoint {checkpoint_number}: runner number must be positive"
            )));
        }
        if !seen.insert(runner.number) {
            return Err(DecodeError::MalformedPayload(format!(
                "checkpoint {checkpoint_number}: runner {} appears more than once",
                runner.number
            )));
        }
    }
    Ok(())
}

/// Build a deterministic default file name for export flows
#[must_use]
pub fn suggested_export_file_name(package: &ExportPackage) -> String {
    let stamp = package
        .exported_at
        .map_or_else(|| "undated".to_string(), |at| at.format("%Y%m%dT%H%M%SZ").to_string());
    match &package.payload {
        ExportPayload::CheckpointResults(results) => format!(
            "tally-{}-cp{}-{stamp}.json",
            results.race_id, results.checkpoint_number
        ),
        ExportPayload::RaceResults(results) => format!("tally-{}-race-{stamp}.json", results.race_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn race() -> RaceId {
        RaceId::new("r1").unwrap()
    }

    fn sample_records() -> Vec<SightingRecord> {
        let passed_at = Utc.with_ymd_and_hms(2026, 6, 6, 10, 5, 0).unwrap();
        vec![
            SightingRecord::new(race(), 2, 102),
            SightingRecord::new(race(), 2, 101).with_status(RunnerStatus::Passed, Some(passed_at)),
        ]
    }

    #[test]
    fn encode_checkpoint_writes_expected_envelope() {
        let package = encode_checkpoint(&race(), 2, &sample_records());
        let json: serde_json::Value = serde_json::from_str(&package.to_json().unwrap()).unwrap();

        assert_eq!(json["version"], "1.0");
        assert_eq!(json["exportType"], "checkpoint-results");
        assert_eq!(json["data"]["raceId"], "r1");
        assert_eq!(json["data"]["checkpointNumber"], 2);
        assert_eq!(json["data"]["runners"][0]["number"], 101);
        assert_eq!(json["data"]["runners"][0]["status"], "passed");
        assert_eq!(json["data"]["runners"][1]["status"], "not-started");
        assert_eq!(json["data"]["runners"][1]["markOffTime"], serde_json::Value::Null);
    }

    #[test]
    fn encoded_package_decodes_to_same_records() {
        let package = encode_checkpoint(&race(), 2, &sample_records());
        let decoded = decode(package.to_json().unwrap().as_bytes()).unwrap();
        assert_eq!(decoded, package);

        let sightings = decoded.payload.sightings_by_checkpoint();
        assert_eq!(sightings[&2].len(), 2);
        assert_eq!(sightings[&2][0].runner_number, 101);
    }

    #[test]
    fn decode_accepts_hand_written_package() {
        let raw = r#"{
            "version": "1.0",
            "exportType": "checkpoint-results",
            "data": {
                "raceId": "r1",
                "checkpointNumber": 4,
                "runners": [
                    { "number": 7, "status": "vet-out", "markOffTime": "2026-06-06T11:00:00Z",
                      "callInTime": null, "calledIn": false, "notes": "lame" }
                ]
            }
        }"#;
        let package = decode(raw.as_bytes()).unwrap();
        assert_eq!(package.export_type(), ExportType::CheckpointResults);
        assert!(package.exported_at.is_none());
        let sightings = package.payload.sightings_by_checkpoint();
        assert_eq!(sightings[&4][0].status, RunnerStatus::VetOut);
        assert_eq!(sightings[&4][0].notes.as_deref(), Some("lame"));
    }

    #[test]
    fn decode_rejects_garbage_as_malformed() {
        assert!(matches!(
            decode(b"not json"),
            Err(DecodeError::MalformedPayload(_))
        ));
        assert!(matches!(
            decode(br#"{"version":"1.0"}"#),
            Err(DecodeError::MalformedPayload(_))
        ));
    }

    #[test]
    fn decode_rejects_unsupported_version() {
        let raw = r#"{"version":"2.0","exportType":"checkpoint-results","data":{}}"#;
        assert_eq!(
            decode(raw.as_bytes()),
            Err(DecodeError::UnsupportedVersion("2.0".to_string()))
        );
    }

    #[test]
    fn decode_rejects_unknown_export_type() {
        let raw = r#"{"version":"1.0","exportType":"race-setup","data":{}}"#;
        assert_eq!(
            decode(raw.as_bytes()),
            Err(DecodeError::UnknownExportType("race-setup".to_string()))
        );
    }

    #[test]
    fn decode_rejects_structural_defects_in_data() {
        let unknown_status = r#"{"version":"1.0","exportType":"checkpoint-results","data":
            {"raceId":"r1","checkpointNumber":1,"runners":[
              {"number":1,"status":"finished","markOffTime":null,"callInTime":null,"calledIn":false,"notes":null}]}}"#;
        let duplicate_runner = r#"{"version":"1.0","exportType":"checkpoint-results","data":
            {"raceId":"r1","checkpointNumber":1,"runners":[
              {"number":1,"status":"passed","markOffTime":null,"callInTime":null,"calledIn":false,"notes":null},
              {"number":1,"status":"dnf","markOffTime":null,"callInTime":null,"calledIn":false,"notes":null}]}}"#;
        let zero_checkpoint = r#"{"version":"1.0","exportType":"checkpoint-results","data":
            {"raceId":"r1","checkpointNumber":0,"runners":[]}}"#;
        let bad_race = r#"{"version":"1.0","exportType":"checkpoint-results","data":
            {"raceId":"","checkpointNumber":1,"runners":[]}}"#;

        for raw in [unknown_status, duplicate_runner, zero_checkpoint, bad_race] {
            assert!(
                matches!(decode(raw.as_bytes()), Err(DecodeError::MalformedPayload(_))),
                "expected malformed: {raw}"
            );
        }
    }

    #[test]
    fn decode_rejects_unknown_fields_at_every_level() {
        let runner = r#"{"number":1,"status":"passed","markOffTime":null,"callInTime":null,"calledIn":false,"notes":null}"#;
        let checkpoint_extra = format!(
            r#"{{"version":"1.0","exportType":"checkpoint-results","data":
            {{"raceId":"r1","checkpointNumber":1,"runners":[{runner}],"device":"tablet-2"}}}}"#
        );
        let race_extra = format!(
            r#"{{"version":"1.0","exportType":"race-results","data":
            {{"raceId":"r1","checkpoints":[{{"checkpointNumber":1,"runners":[{runner}]}}],"station":"base"}}}}"#
        );
        let group_extra = format!(
            r#"{{"version":"1.0","exportType":"race-results","data":
            {{"raceId":"r1","checkpoints":[{{"checkpointNumber":1,"runners":[{runner}],"label":"ridge"}}]}}}}"#
        );

        for raw in [checkpoint_extra, race_extra, group_extra] {
            assert!(
                matches!(decode(raw.as_bytes()), Err(DecodeError::MalformedPayload(_))),
                "expected malformed: {raw}"
            );
        }
    }

    #[test]
    fn malformed_payload_message_is_bounded() {
        let long_field = "x".repeat(400);
        let raw = format!(
            r#"{{"version":"1.0","exportType":"checkpoint-results","data":
            {{"raceId":"r1","checkpointNumber":1,"runners":[],"{long_field}":1}}}}"#
        );
        match decode(raw.as_bytes()) {
            Err(DecodeError::MalformedPayload(message)) => {
                assert!(message.chars().count() <= 180);
            }
            other => panic!("expected malformed payload, got {other:?}"),
        }
    }

    #[test]
    fn race_results_group_by_checkpoint() {
        let mut records = sample_records();
        records.push(SightingRecord::new(race(), 1, 101));
        records.push(SightingRecord::new(RaceId::new("other").unwrap(), 1, 5));

        let package = encode_race(&race(), &records);
        let decoded = decode(package.to_json().unwrap().as_bytes()).unwrap();
        assert_eq!(decoded.export_type(), ExportType::RaceResults);

        let grouped = decoded.payload.sightings_by_checkpoint();
        assert_eq!(grouped.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(grouped[&1].len(), 1);
        assert_eq!(grouped[&2].len(), 2);
    }

    #[test]
    fn suggested_file_name_mentions_race_and_checkpoint() {
        let mut package = encode_checkpoint(&race(), 3, &[]);
        package.exported_at = Some(Utc.with_ymd_and_hms(2026, 6, 6, 9, 30, 0).unwrap());
        assert_eq!(
            suggested_export_file_name(&package),
            "tally-r1-cp3-20260606T093000Z.json"
        );
    }
}
