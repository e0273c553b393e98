use std::fmt;

use serde::{Deserialize, Serialize};

/// Points every new dashboard starts with.
pub const STARTING_POINTS: i32 = 100;
/// Number of activity lines a dashboard keeps.
pub const MAX_RECENT_ACTIVITY: usize = 20;
pub const MAX_SKILLS: usize = 25;
pub const MAX_CERTIFICATIONS: usize = 10;
/// Points credited per profile successfully imported from a scrape batch.
pub const REWARD_PER_PROFILE: i32 = 10;
pub const DEFAULT_AVATAR_URL: &str = "https://static.licdn.com/aero-v1/sc/h/9c8pery4andzj6ohjkjp54ma2";

/// Coarse seniority bucket derived from a job title.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeniorityLevel {
    #[serde(rename = "C-Level")]
    CLevel,
    #[serde(rename = "VP")]
    Vp,
    Director,
    Senior,
    #[default]
    #[serde(rename = "Mid-level")]
    MidLevel,
    #[serde(rename = "Entry-level")]
    EntryLevel,
}

impl SeniorityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeniorityLevel::CLevel => "C-Level",
            SeniorityLevel::Vp => "VP",
            SeniorityLevel::Director => "Director",
            SeniorityLevel::Senior => "Senior",
            SeniorityLevel::MidLevel => "Mid-level",
            SeniorityLevel::EntryLevel => "Entry-level",
        }
    }
}

impl fmt::Display for SeniorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contact details a user attaches to a LinkedIn URL when submitting it.
/// These never leave the platform; they are merged back in after scraping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactOverrides {
    pub url: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub extra_links: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seniority_serializes_to_display_labels() {
        assert_eq!(
            serde_json::to_value(SeniorityLevel::CLevel).unwrap(),
            serde_json::json!("C-Level")
        );
        assert_eq!(
            serde_json::to_value(SeniorityLevel::EntryLevel).unwrap(),
            serde_json::json!("Entry-level")
        );
        assert_eq!(SeniorityLevel::MidLevel.to_string(), "Mid-level");
    }

    #[test]
    fn overrides_accept_camel_case() {
        let o: ContactOverrides = serde_json::from_value(serde_json::json!({
            "url": "https://linkedin.com/in/x",
            "extraLinks": ["https://x.dev"]
        }))
        .unwrap();
        assert_eq!(o.extra_links, vec!["https://x.dev"]);
        assert!(o.phone.is_none());
    }
}
