use chrono::NaiveDate;
use garmin_notion_sync::common::convert::{
    activity_type_label, enum_label, grams_to_pounds, kilograms_to_pounds, meters_to_feet,
    meters_to_miles, round2, seconds_to_hours, seconds_to_minutes, speed_to_mph,
    speed_to_pace_min_per_mile, to_iso,
};
use garmin_notion_sync::common::extract::{
    extract, extract_f64, extract_i64, extract_node, extract_str,
};
use garmin_notion_sync::common::garmin_client::DailyMetric;
use garmin_notion_sync::common::notion_property::FieldValue;
use serde_json::Value;

/// Garmin reports weight in grams; smaller readings are already kilograms.
const GRAMS_THRESHOLD: f64 = 1000.0;

/// Raw per-day responses. A metric that failed to load is `Null`.
#[derive(Debug, Default, Clone)]
pub struct DailyResponses {
    pub user_summary: Value,
    pub sleep: Value,
    pub body_battery: Value,
    pub body_composition: Value,
    pub training_readiness: Value,
    pub training_status: Value,
    pub resting_heart_rate: Value,
    pub hrv: Value,
}

impl DailyResponses {
    pub fn set(&mut self, metric: DailyMetric, value: Value) {
        let slot = match metric {
            DailyMetric::UserSummary => &mut self.user_summary,
            DailyMetric::Sleep => &mut self.sleep,
            DailyMetric::BodyBattery => &mut self.body_battery,
            DailyMetric::BodyComposition => &mut self.body_composition,
            DailyMetric::TrainingReadiness => &mut self.training_readiness,
            DailyMetric::TrainingStatus => &mut self.training_status,
            DailyMetric::RestingHeartRate => &mut self.resting_heart_rate,
            DailyMetric::Hrv => &mut self.hrv,
        };
        *slot = value;
    }
}

/// The column a row is identified by when looking for an existing page.
#[derive(Debug, Clone, PartialEq)]
pub struct DedupKey {
    pub column: &'static str,
    pub value: FieldValue,
}

/// A record flattened into desired column names, ready to be matched
/// against a database schema. Every known field is listed; `None` clears
/// the column so an updated page does not keep a stale value.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub title: String,
    pub date: Option<String>,
    pub fields: Vec<(&'static str, Option<FieldValue>)>,
    pub dedup: Option<DedupKey>,
}

impl Row {
    /// A row needs a title and a date to be written.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.title.trim().is_empty() {
            return Err("missing title");
        }
        match self.date.as_deref() {
            Some(date) if !date.trim().is_empty() => Ok(()),
            _ => Err("missing date"),
        }
    }
}

type Fields = Vec<(&'static str, Option<FieldValue>)>;

fn push_number<T: Into<f64>>(fields: &mut Fields, name: &'static str, value: Option<T>) {
    fields.push((name, value.map(|v| FieldValue::Number(v.into()))));
}

fn push_text(fields: &mut Fields, name: &'static str, value: &Option<String>) {
    fields.push((name, value.clone().map(FieldValue::Text)));
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthRecord {
    pub date: NaiveDate,
    pub steps: Option<i64>,
    pub step_goal: Option<i64>,
    pub total_calories: Option<f64>,
    pub active_calories: Option<f64>,
    pub resting_heart_rate: Option<i64>,
    pub stress_average: Option<i64>,
    pub sleep_score: Option<f64>,
    pub sleep_hours: Option<f64>,
    pub deep_sleep_hours: Option<f64>,
    pub light_sleep_hours: Option<f64>,
    pub rem_sleep_hours: Option<f64>,
    pub awake_hours: Option<f64>,
    pub body_battery_high: Option<i64>,
    pub body_battery_low: Option<i64>,
    pub body_battery_charged: Option<i64>,
    pub body_battery_drained: Option<i64>,
    pub weight_lb: Option<f64>,
    pub body_fat_percent: Option<f64>,
    pub bmi: Option<f64>,
    pub readiness_score: Option<i64>,
    pub readiness_level: Option<String>,
    pub training_status: Option<String>,
    pub hrv_last_night: Option<i64>,
    pub hrv_status: Option<String>,
}

impl HealthRecord {
    pub fn from_responses(date: NaiveDate, responses: &DailyResponses) -> Self {
        let summary = &responses.user_summary;
        let sleep = &responses.sleep;
        let battery = &responses.body_battery;
        let composition = &responses.body_composition;
        let hrv = extract_node(&responses.hrv, &["hrvSummary"]).unwrap_or(&responses.hrv);

        let sleep_seconds = |keys: &[&str]| extract_f64(sleep, keys).map(seconds_to_hours);
        let (battery_low, battery_high) = battery_range(battery);

        Self {
            date,
            steps: extract_i64(summary, &["totalSteps", "steps"]),
            step_goal: extract_i64(summary, &["dailyStepGoal", "stepGoal"]),
            total_calories: extract_f64(summary, &["totalKilocalories", "totalCalories"]),
            active_calories: extract_f64(summary, &["activeKilocalories", "activeCalories"]),
            resting_heart_rate: extract_i64(summary, &["restingHeartRate"])
                .or_else(|| {
                    extract_node(&responses.resting_heart_rate, &["WELLNESS_RESTING_HEART_RATE"])
                        .and_then(|node| extract_i64(node, &["value"]))
                })
                .or_else(|| extract_i64(&responses.resting_heart_rate, &["restingHeartRate"])),
            // Garmin uses negative levels for "not enough data"
            stress_average: extract_i64(summary, &["averageStressLevel", "avgStressLevel"])
                .filter(|level| *level >= 0),
            sleep_score: extract_f64(sleep, &["sleepScore", "overallScore"]).or_else(|| {
                extract_node(sleep, &["overall"]).and_then(|node| extract_f64(node, &["value"]))
            }),
            sleep_hours: sleep_seconds(&["sleepTimeSeconds"]),
            deep_sleep_hours: sleep_seconds(&["deepSleepSeconds"]),
            light_sleep_hours: sleep_seconds(&["lightSleepSeconds"]),
            rem_sleep_hours: sleep_seconds(&["remSleepSeconds"]),
            awake_hours: sleep_seconds(&["awakeSleepSeconds"]),
            body_battery_high: extract_i64(summary, &["bodyBatteryHighestValue"]).or(battery_high),
            body_battery_low: extract_i64(summary, &["bodyBatteryLowestValue"]).or(battery_low),
            body_battery_charged: extract_i64(summary, &["bodyBatteryChargedValue"])
                .or_else(|| extract_i64(battery, &["charged"])),
            body_battery_drained: extract_i64(summary, &["bodyBatteryDrainedValue"])
                .or_else(|| extract_i64(battery, &["drained"])),
            weight_lb: extract_f64(composition, &["weight"])
                .filter(|weight| *weight > 0.0)
                .map(|weight| {
                    if weight >= GRAMS_THRESHOLD {
                        grams_to_pounds(weight)
                    } else {
                        kilograms_to_pounds(weight)
                    }
                }),
            body_fat_percent: extract_f64(composition, &["bodyFat"]).map(round2),
            bmi: extract_f64(composition, &["bmi"]).map(round2),
            readiness_score: extract_i64(&responses.training_readiness, &["score"]),
            readiness_level: extract_str(&responses.training_readiness, &["level"])
                .and_then(|level| enum_label(&level)),
            training_status: extract_str(
                &responses.training_status,
                &["trainingStatusFeedbackPhrase", "trainingStatusPhrase"],
            )
            .and_then(|phrase| enum_label(&phrase)),
            hrv_last_night: extract_i64(hrv, &["lastNightAvg"]),
            hrv_status: extract_str(hrv, &["status"]).and_then(|status| enum_label(&status)),
        }
    }

    pub fn has_metrics(&self) -> bool {
        self.to_row().fields.iter().any(|(_, value)| value.is_some())
    }

    pub fn to_row(&self) -> Row {
        let mut fields = Vec::new();
        push_number(&mut fields, "Steps", self.steps.map(|v| v as f64));
        push_number(&mut fields, "Step Goal", self.step_goal.map(|v| v as f64));
        push_number(&mut fields, "Active Calories", self.active_calories);
        push_number(&mut fields, "Calories", self.total_calories);
        push_number(&mut fields, "Resting HR", self.resting_heart_rate.map(|v| v as f64));
        push_number(&mut fields, "Stress", self.stress_average.map(|v| v as f64));
        push_number(&mut fields, "Sleep Score", self.sleep_score);
        push_number(&mut fields, "Sleep Hours", self.sleep_hours);
        push_number(&mut fields, "Deep Sleep", self.deep_sleep_hours);
        push_number(&mut fields, "Light Sleep", self.light_sleep_hours);
        push_number(&mut fields, "REM Sleep", self.rem_sleep_hours);
        push_number(&mut fields, "Awake Time", self.awake_hours);
        push_number(&mut fields, "Body Battery High", self.body_battery_high.map(|v| v as f64));
        push_number(&mut fields, "Body Battery Low", self.body_battery_low.map(|v| v as f64));
        push_number(&mut fields, "Body Battery Charged", self.body_battery_charged.map(|v| v as f64));
        push_number(&mut fields, "Body Battery Drained", self.body_battery_drained.map(|v| v as f64));
        push_number(&mut fields, "Bodyweight", self.weight_lb);
        push_number(&mut fields, "Body Fat", self.body_fat_percent);
        push_number(&mut fields, "BMI", self.bmi);
        push_number(&mut fields, "Training Readiness", self.readiness_score.map(|v| v as f64));
        push_text(&mut fields, "Readiness Level", &self.readiness_level);
        push_text(&mut fields, "Training Status", &self.training_status);
        push_text(&mut fields, "HRV Status", &self.hrv_status);
        push_number(&mut fields, "HRV", self.hrv_last_night.map(|v| v as f64));

        let date = self.date.format("%Y-%m-%d").to_string();
        Row {
            title: format!("Health {date}"),
            date: Some(date.clone()),
            fields,
            dedup: Some(DedupKey {
                column: "Date",
                value: FieldValue::Date(date),
            }),
        }
    }
}

/// Lowest and highest level in a body battery report's
/// `[timestamp, level]` samples.
fn battery_range(report: &Value) -> (Option<i64>, Option<i64>) {
    let levels: Vec<i64> = extract_node(report, &["bodyBatteryValuesArray"])
        .and_then(Value::as_array)
        .map(|samples| {
            samples
                .iter()
                .filter_map(|sample| sample.as_array()?.get(1)?.as_i64())
                .collect()
        })
        .unwrap_or_default();
    (levels.iter().copied().min(), levels.iter().copied().max())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRecord {
    pub activity_id: Option<String>,
    pub name: String,
    /// Local start time, ISO-8601.
    pub start: Option<String>,
    pub type_label: String,
    pub distance_mi: Option<f64>,
    pub duration_min: Option<f64>,
    pub pace_min_per_mi: Option<f64>,
    pub avg_speed_mph: Option<f64>,
    pub avg_hr: Option<i64>,
    pub max_hr: Option<i64>,
    pub calories: Option<f64>,
    pub elevation_gain_ft: Option<f64>,
    pub steps: Option<i64>,
    pub aerobic_te: Option<f64>,
    pub anaerobic_te: Option<f64>,
    pub training_effect: Option<String>,
}

impl ActivityRecord {
    pub fn from_response(activity: &Value) -> Self {
        let average_speed = extract_f64(activity, &["averageSpeed", "avgSpeed"]);
        let start = ["startTimeLocal", "startTimeGMT", "beginTimestamp"]
            .iter()
            .find_map(|key| activity.get(*key).and_then(to_iso));

        Self {
            activity_id: extract_str(activity, &["activityId"]),
            name: extract(activity, &["activityName", "name"])
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string(),
            start,
            type_label: activity
                .get("activityType")
                .and_then(|kind| extract_str(kind, &["typeKey"]))
                .map(|key| activity_type_label(&key))
                .unwrap_or_else(|| activity_type_label("")),
            distance_mi: extract_f64(activity, &["distance"]).map(meters_to_miles),
            duration_min: extract_f64(activity, &["duration", "elapsedDuration"])
                .map(seconds_to_minutes),
            pace_min_per_mi: average_speed.and_then(speed_to_pace_min_per_mile),
            avg_speed_mph: average_speed.map(speed_to_mph),
            avg_hr: extract_i64(activity, &["averageHR", "averageHeartRate"]),
            max_hr: extract_i64(activity, &["maxHR", "maxHeartRate"]),
            calories: extract_f64(activity, &["calories"]).map(round2),
            elevation_gain_ft: extract_f64(activity, &["elevationGain"]).map(meters_to_feet),
            steps: extract_i64(activity, &["steps"]),
            aerobic_te: extract_f64(activity, &["aerobicTrainingEffect"]).map(round2),
            anaerobic_te: extract_f64(activity, &["anaerobicTrainingEffect"]).map(round2),
            training_effect: extract_str(activity, &["trainingEffectLabel"])
                .and_then(|label| enum_label(&label)),
        }
    }

    /// Calendar day the activity started on, in the athlete's local time.
    pub fn local_date(&self) -> Option<NaiveDate> {
        let start = self.start.as_deref()?;
        NaiveDate::parse_from_str(start.get(..10)?, "%Y-%m-%d").ok()
    }

    pub fn to_row(&self) -> Row {
        let mut fields = Vec::new();
        if let Some(id) = &self.activity_id {
            fields.push(("Activity ID", Some(FieldValue::Text(id.clone()))));
        }
        fields.push(("Type", Some(FieldValue::Text(self.type_label.clone()))));
        push_number(&mut fields, "Distance", self.distance_mi);
        push_number(&mut fields, "Duration", self.duration_min);
        push_number(&mut fields, "Avg Pace", self.pace_min_per_mi);
        push_number(&mut fields, "Avg Speed", self.avg_speed_mph);
        push_number(&mut fields, "Avg HR", self.avg_hr.map(|v| v as f64));
        push_number(&mut fields, "Max HR", self.max_hr.map(|v| v as f64));
        push_number(&mut fields, "Calories", self.calories);
        push_number(&mut fields, "Elevation Gain", self.elevation_gain_ft);
        push_number(&mut fields, "Steps", self.steps.map(|v| v as f64));
        push_number(&mut fields, "Anaerobic TE", self.anaerobic_te);
        push_number(&mut fields, "Aerobic TE", self.aerobic_te);
        push_text(&mut fields, "Training Effect", &self.training_effect);

        Row {
            title: self.name.clone(),
            date: self.start.clone(),
            fields,
            dedup: self.activity_id.as_ref().map(|id| DedupKey {
                column: "Activity ID",
                value: FieldValue::Text(id.clone()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
    }

    fn responses() -> DailyResponses {
        let mut responses = DailyResponses::default();
        responses.set(
            DailyMetric::UserSummary,
            json!({
                "calendarDate": "2024-03-02",
                "totalSteps": 0,
                "dailyStepGoal": 8000,
                "totalKilocalories": 2310.0,
                "activeKilocalories": 410.0,
                "averageStressLevel": -1,
                "bodyBatteryChargedValue": 55,
                "bodyBatteryDrainedValue": 61
            }),
        );
        responses.set(
            DailyMetric::Sleep,
            json!({
                "dailySleepDTO": {
                    "sleepTimeSeconds": 27000,
                    "deepSleepSeconds": 5400,
                    "lightSleepSeconds": 14400,
                    "remSleepSeconds": 5400,
                    "awakeSleepSeconds": 1800,
                    "sleepScores": {
                        "totalDuration": {"qualifierKey": "GOOD"},
                        "overall": {"value": 84, "qualifierKey": "GOOD"}
                    }
                }
            }),
        );
        responses.set(
            DailyMetric::BodyBattery,
            json!([{
                "date": "2024-03-02",
                "charged": 50,
                "drained": 60,
                "bodyBatteryValuesArray": [[1709337600000_i64, 35], [1709366400000_i64, 90], [1709420000000_i64, 22]]
            }]),
        );
        responses.set(
            DailyMetric::BodyComposition,
            json!({
                "dateWeightList": [{"weight": 81646.6, "bodyFat": 18.234, "bmi": 24.1}],
                "totalAverage": {"weight": null}
            }),
        );
        responses.set(
            DailyMetric::TrainingReadiness,
            json!([{"calendarDate": "2024-03-02", "score": 72, "level": "MODERATE"}]),
        );
        responses.set(
            DailyMetric::TrainingStatus,
            json!({
                "mostRecentTrainingStatus": {
                    "latestTrainingStatusData": {
                        "3391234567": {"trainingStatus": 4, "trainingStatusFeedbackPhrase": "PRODUCTIVE_6"}
                    }
                }
            }),
        );
        responses.set(
            DailyMetric::RestingHeartRate,
            json!({
                "allMetrics": {"metricsMap": {"WELLNESS_RESTING_HEART_RATE": [{"value": 52.0, "calendarDate": "2024-03-02"}]}}
            }),
        );
        responses.set(
            DailyMetric::Hrv,
            json!({"hrvSummary": {"weeklyAvg": 48, "lastNightAvg": 45, "status": "BALANCED"}}),
        );
        responses
    }

    #[test]
    fn test_health_record_from_responses() {
        let record = HealthRecord::from_responses(date(), &responses());

        assert_eq!(record.steps, Some(0));
        assert_eq!(record.step_goal, Some(8000));
        assert_eq!(record.total_calories, Some(2310.0));
        assert_eq!(record.stress_average, None);
        assert_eq!(record.sleep_score, Some(84.0));
        assert_eq!(record.sleep_hours, Some(7.5));
        assert_eq!(record.deep_sleep_hours, Some(1.5));
        assert_eq!(record.awake_hours, Some(0.5));
        assert_eq!(record.body_battery_high, Some(90));
        assert_eq!(record.body_battery_low, Some(22));
        assert_eq!(record.body_battery_charged, Some(55));
        assert_eq!(record.weight_lb, Some(180.0));
        assert_eq!(record.body_fat_percent, Some(18.23));
        assert_eq!(record.readiness_score, Some(72));
        assert_eq!(record.readiness_level.as_deref(), Some("Moderate"));
        assert_eq!(record.training_status.as_deref(), Some("Productive"));
        assert_eq!(record.resting_heart_rate, Some(52));
        assert_eq!(record.hrv_last_night, Some(45));
        assert_eq!(record.hrv_status.as_deref(), Some("Balanced"));
    }

    #[test]
    fn test_health_record_survives_missing_metrics() {
        let record = HealthRecord::from_responses(date(), &DailyResponses::default());
        assert!(!record.has_metrics());

        let row = record.to_row();
        assert_eq!(row.title, "Health 2024-03-02");
        assert_eq!(row.date.as_deref(), Some("2024-03-02"));
        assert!(row.validate().is_ok());
        assert_eq!(
            row.dedup,
            Some(DedupKey {
                column: "Date",
                value: FieldValue::Date("2024-03-02".to_string())
            })
        );
    }

    #[test]
    fn test_health_row_keeps_zero_steps() {
        let row = HealthRecord::from_responses(date(), &responses()).to_row();
        assert!(row.fields.contains(&("Steps", Some(FieldValue::Number(0.0)))));
        assert!(row.fields.contains(&(
            "Training Status",
            Some(FieldValue::Text("Productive".to_string()))
        )));
    }

    #[test]
    fn test_health_row_lists_absent_metrics() {
        let mut responses = DailyResponses::default();
        responses.set(DailyMetric::UserSummary, json!({"totalKilocalories": 2310.0}));
        let row = HealthRecord::from_responses(date(), &responses).to_row();

        assert!(row.fields.contains(&("Calories", Some(FieldValue::Number(2310.0)))));
        assert!(row.fields.contains(&("Active Calories", None)));
        assert!(row.fields.contains(&("HRV Status", None)));
        assert!(row.fields.contains(&("HRV", None)));
    }

    #[test]
    fn test_weight_in_kilograms() {
        let mut responses = DailyResponses::default();
        responses.set(DailyMetric::BodyComposition, json!({"weight": 80.0}));
        let record = HealthRecord::from_responses(date(), &responses);
        assert_eq!(record.weight_lb, Some(176.37));
    }

    fn run_activity() -> Value {
        json!({
            "activityId": 14123456789_i64,
            "activityName": "Morning Run",
            "startTimeLocal": "2024-03-02 06:45:10",
            "startTimeGMT": "2024-03-02 11:45:10",
            "activityType": {"typeId": 1, "typeKey": "running"},
            "eventType": {"typeKey": "uncategorized"},
            "distance": 5000.0,
            "duration": 1830.0,
            "averageSpeed": 2.68224,
            "averageHR": 151.0,
            "maxHR": 172.0,
            "calories": 402.0,
            "elevationGain": 30.0,
            "steps": 5230,
            "aerobicTrainingEffect": 3.1,
            "anaerobicTrainingEffect": 0.4,
            "trainingEffectLabel": "AEROBIC_BASE"
        })
    }

    #[test]
    fn test_activity_record_from_response() {
        let record = ActivityRecord::from_response(&run_activity());

        assert_eq!(record.activity_id.as_deref(), Some("14123456789"));
        assert_eq!(record.name, "Morning Run");
        assert_eq!(record.start.as_deref(), Some("2024-03-02T06:45:10"));
        assert_eq!(record.local_date(), Some(date()));
        assert_eq!(record.type_label, "Running");
        assert_eq!(record.distance_mi, Some(3.11));
        assert_eq!(record.duration_min, Some(30.5));
        assert_eq!(record.pace_min_per_mi, Some(10.0));
        assert_eq!(record.avg_hr, Some(151));
        assert_eq!(record.elevation_gain_ft, Some(98.43));
        assert_eq!(record.training_effect.as_deref(), Some("Aerobic Base"));
    }

    #[test]
    fn test_activity_row_dedups_on_activity_id() {
        let row = ActivityRecord::from_response(&run_activity()).to_row();
        assert_eq!(row.title, "Morning Run");
        assert_eq!(
            row.dedup,
            Some(DedupKey {
                column: "Activity ID",
                value: FieldValue::Text("14123456789".to_string())
            })
        );
        assert!(row.validate().is_ok());
    }

    #[test]
    fn test_activity_without_name_or_start_is_invalid() {
        let record = ActivityRecord::from_response(&json!({"activityId": 1, "distance": 0}));
        assert_eq!(record.type_label, "Unknown");
        assert_eq!(record.distance_mi, Some(0.0));
        assert_eq!(record.pace_min_per_mi, None);
        assert_eq!(record.to_row().validate(), Err("missing title"));

        let record = ActivityRecord::from_response(&json!({"activityName": "Walk"}));
        assert_eq!(record.to_row().validate(), Err("missing date"));
        assert_eq!(record.to_row().dedup, None);
    }
}
