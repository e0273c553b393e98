use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// --- Actor input ---

/// Input for the LinkedIn profile scraper actor.
///
/// Only profile URLs leave the platform. The contact-lookup token is sent
/// empty so the actor never performs its own email/phone enrichment.
#[derive(Debug, Clone, Serialize)]
pub struct LinkedInScraperInput {
    #[serde(rename = "profileUrls")]
    pub profile_urls: Vec<String>,
    #[serde(rename = "contactLookupToken")]
    pub contact_lookup_token: String,
}

impl LinkedInScraperInput {
    pub fn new(profile_urls: Vec<String>) -> Self {
        Self {
            profile_urls,
            contact_lookup_token: String::new(),
        }
    }
}

/// Wrapper for Apify API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

// --- Run metadata ---

/// Apify actor run metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RunData {
    pub id: String,
    pub status: String,
    #[serde(rename = "defaultDatasetId")]
    pub default_dataset_id: String,
    #[serde(rename = "startedAt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(rename = "finishedAt")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunData {
    pub fn run_status(&self) -> RunStatus {
        RunStatus::parse(&self.status)
    }
}

/// Lifecycle states reported by `GET /actor-runs/{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Ready,
    Running,
    Succeeded,
    Failed,
    Aborting,
    Aborted,
    TimingOut,
    TimedOut,
    Unknown,
}

impl RunStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "READY" => RunStatus::Ready,
            "RUNNING" => RunStatus::Running,
            "SUCCEEDED" => RunStatus::Succeeded,
            "FAILED" => RunStatus::Failed,
            "ABORTING" => RunStatus::Aborting,
            "ABORTED" => RunStatus::Aborted,
            "TIMING-OUT" => RunStatus::TimingOut,
            "TIMED-OUT" => RunStatus::TimedOut,
            _ => RunStatus::Unknown,
        }
    }

    /// Terminal states never change again. `Unknown` is treated as still in flight.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded | RunStatus::Failed | RunStatus::Aborted | RunStatus::TimedOut
        )
    }
}

// --- LinkedIn profile dataset item ---

/// One item of the LinkedIn scraper dataset.
///
/// The actor's output drifts between versions, so every field is optional and
/// list fields tolerate `null`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LinkedInProfile {
    #[serde(rename = "firstName")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName")]
    pub last_name: Option<String>,
    #[serde(rename = "fullName")]
    pub full_name: Option<String>,
    pub title: Option<String>,
    pub occupation: Option<String>,
    #[serde(rename = "companyName")]
    pub company_name: Option<String>,
    #[serde(rename = "industryName")]
    pub industry_name: Option<String>,
    #[serde(rename = "locationName")]
    pub location_name: Option<String>,
    #[serde(rename = "geoCountryName")]
    pub geo_country_name: Option<String>,
    #[serde(rename = "pictureUrl", alias = "profilePicture")]
    pub picture_url: Option<String>,
    /// The URL we submitted, echoed back by the actor.
    #[serde(rename = "inputUrl")]
    pub input_url: Option<String>,
    pub url: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub positions: Vec<Position>,
    #[serde(deserialize_with = "null_as_empty")]
    pub skills: Vec<NamedEntry>,
    #[serde(deserialize_with = "null_as_empty")]
    pub courses: Vec<NamedEntry>,
    #[serde(deserialize_with = "null_as_empty")]
    pub certifications: Vec<NamedEntry>,
    #[serde(deserialize_with = "null_as_empty")]
    pub educations: Vec<Education>,
}

impl LinkedInProfile {
    /// The URL this item was scraped for, preferring the echoed input.
    pub fn source_url(&self) -> Option<&str> {
        non_blank(self.input_url.as_deref()).or_else(|| non_blank(self.url.as_deref()))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Position {
    pub title: Option<String>,
    #[serde(rename = "companyName")]
    pub company_name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "locationName")]
    pub location_name: Option<String>,
    #[serde(rename = "timePeriod")]
    pub time_period: Option<TimePeriod>,
    pub company: Option<PositionCompany>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TimePeriod {
    #[serde(rename = "startDate")]
    pub start_date: Option<YearMonth>,
    #[serde(rename = "endDate")]
    pub end_date: Option<YearMonth>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct YearMonth {
    #[serde(deserialize_with = "lenient_i32")]
    pub year: Option<i32>,
    #[serde(deserialize_with = "lenient_i32")]
    pub month: Option<i32>,
}

/// Employer details nested in a position.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PositionCompany {
    pub name: Option<String>,
    pub industry: Option<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub industries: Vec<String>,
    #[serde(rename = "employeeCountRange")]
    pub employee_count_range: Option<EmployeeCountRange>,
}

impl PositionCompany {
    pub fn primary_industry(&self) -> Option<&str> {
        non_blank(self.industry.as_deref())
            .or_else(|| self.industries.iter().find_map(|i| non_blank(Some(i))))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmployeeCountRange {
    #[serde(deserialize_with = "lenient_i32")]
    pub start: Option<i32>,
    #[serde(deserialize_with = "lenient_i32")]
    pub end: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Education {
    #[serde(rename = "degreeName")]
    pub degree_name: Option<String>,
    #[serde(rename = "fieldOfStudy")]
    pub field_of_study: Option<String>,
    #[serde(rename = "schoolName")]
    pub school_name: Option<String>,
    #[serde(rename = "timePeriod")]
    pub time_period: Option<TimePeriod>,
}

/// Skills, courses and certifications arrive either as bare strings or as
/// objects carrying a `name` or `title`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NamedEntry {
    Text(String),
    Named {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        title: Option<String>,
    },
    Other(serde_json::Value),
}

impl NamedEntry {
    /// Trimmed display label, `None` when blank or unrecognised.
    pub fn label(&self) -> Option<&str> {
        match self {
            NamedEntry::Text(s) => non_blank(Some(s)),
            NamedEntry::Named { name, title } => {
                non_blank(name.as_deref()).or_else(|| non_blank(title.as_deref()))
            }
            NamedEntry::Other(_) => None,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts `2018`, `"2018"` or `null`.
fn lenient_i32<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_voyager_style_item() {
        let item: LinkedInProfile = serde_json::from_value(json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "inputUrl": "https://www.linkedin.com/in/ada/",
            "positions": [{
                "title": "Engineer",
                "companyName": "Acme",
                "timePeriod": {"startDate": {"year": 2018, "month": 3}},
                "company": {"employeeCountRange": {"start": 11, "end": 50}}
            }],
            "skills": ["Rust", {"name": "Go"}, {"title": "SQL"}, 42, null],
            "educations": null
        }))
        .unwrap();

        assert_eq!(item.first_name.as_deref(), Some("Ada"));
        assert_eq!(item.positions.len(), 1);
        let start = item.positions[0]
            .time_period
            .as_ref()
            .and_then(|t| t.start_date.as_ref())
            .unwrap();
        assert_eq!(start.year, Some(2018));
        assert_eq!(start.month, Some(3));
        let labels: Vec<_> = item.skills.iter().filter_map(NamedEntry::label).collect();
        assert_eq!(labels, vec!["Rust", "Go", "SQL"]);
        assert!(item.educations.is_empty());
        assert_eq!(item.source_url(), Some("https://www.linkedin.com/in/ada/"));
    }

    #[test]
    fn string_years_are_accepted() {
        let ym: YearMonth = serde_json::from_value(json!({"year": "2020", "month": null})).unwrap();
        assert_eq!(ym.year, Some(2020));
        assert_eq!(ym.month, None);
    }

    #[test]
    fn profile_picture_alias() {
        let item: LinkedInProfile =
            serde_json::from_value(json!({"profilePicture": "https://img/x.png"})).unwrap();
        assert_eq!(item.picture_url.as_deref(), Some("https://img/x.png"));
    }

    #[test]
    fn source_url_falls_back_to_url() {
        let item: LinkedInProfile =
            serde_json::from_value(json!({"inputUrl": "  ", "url": "https://linkedin.com/in/bob"}))
                .unwrap();
        assert_eq!(item.source_url(), Some("https://linkedin.com/in/bob"));
    }

    #[test]
    fn run_status_terminal_states() {
        assert!(RunStatus::parse("SUCCEEDED").is_terminal());
        assert!(RunStatus::parse("TIMED-OUT").is_terminal());
        assert!(!RunStatus::parse("RUNNING").is_terminal());
        assert_eq!(RunStatus::parse("weird"), RunStatus::Unknown);
        assert!(!RunStatus::Unknown.is_terminal());
    }
}
