//! Maps a scraped LinkedIn payload plus the submitter's contact overrides
//! onto a [`NewProfile`] ready for persistence.

use apify_client::{Education, LinkedInProfile, Position, TimePeriod, YearMonth};
use uuid::Uuid;

use leadvault_common::{
    ContactOverrides, SeniorityLevel, DEFAULT_AVATAR_URL, MAX_CERTIFICATIONS, MAX_SKILLS,
};

use crate::profiles::NewProfile;

const POSITION_SEPARATOR: &str = "\n\n---\n\n";
const FALLBACK_INDUSTRY: &str = "Other";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("insufficient profile data")]
    InsufficientData,
}

/// A normalized record plus the account it will be filed under.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedProfile {
    pub uploaded_by: Uuid,
    pub profile: NewProfile,
}

pub fn normalize_profile(
    raw: &LinkedInProfile,
    user_id: Uuid,
    overrides: &ContactOverrides,
    current_year: i32,
) -> Result<NormalizedProfile, NormalizeError> {
    let first_position = raw.positions.first();
    let experience = experience_years(&raw.positions, current_year);
    let job_title = effective_title(raw).unwrap_or_default();

    let profile = NewProfile {
        name: full_name(raw),
        seniority_level: seniority_for(&job_title, experience),
        job_title,
        company: first_non_blank([
            raw.company_name.as_deref(),
            first_position.and_then(position_company),
        ])
        .unwrap_or_default(),
        location: first_non_blank([
            raw.location_name.as_deref(),
            raw.geo_country_name.as_deref(),
            first_position.and_then(|p| p.location_name.as_deref()),
        ])
        .unwrap_or_default(),
        industry: industry(raw),
        experience,
        skills: collect_skills(raw),
        education: render_education(&raw.educations),
        work_experience: render_positions(&raw.positions),
        company_size: company_size(first_position),
        avatar: first_non_blank([raw.picture_url.as_deref()])
            .unwrap_or_else(|| DEFAULT_AVATAR_URL.to_string()),
        email: first_non_blank([overrides.email.as_deref(), raw.email.as_deref()]),
        phone: first_non_blank([overrides.phone.as_deref(), raw.phone.as_deref()]),
        linkedin_url: first_non_blank([raw.source_url(), Some(overrides.url.as_str())]),
        extra_links: overrides
            .extra_links
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect(),
    };

    let has_substance =
        profile.experience > 0 || !profile.company.is_empty() || !profile.job_title.is_empty();
    if profile.name.is_empty() || !has_substance {
        return Err(NormalizeError::InsufficientData);
    }

    Ok(NormalizedProfile {
        uploaded_by: user_id,
        profile,
    })
}

fn first_non_blank<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn full_name(raw: &LinkedInProfile) -> String {
    let joined = format!(
        "{} {}",
        raw.first_name.as_deref().unwrap_or_default().trim(),
        raw.last_name.as_deref().unwrap_or_default().trim()
    );
    let joined = joined.trim();
    if !joined.is_empty() {
        return joined.to_string();
    }
    first_non_blank([raw.full_name.as_deref()]).unwrap_or_default()
}

fn effective_title(raw: &LinkedInProfile) -> Option<String> {
    first_non_blank([
        raw.title.as_deref(),
        raw.occupation.as_deref(),
        raw.positions.first().and_then(|p| p.title.as_deref()),
    ])
}

fn position_company(position: &Position) -> Option<&str> {
    position
        .company_name
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| position.company.as_ref().and_then(|c| c.name.as_deref()))
}

fn industry(raw: &LinkedInProfile) -> String {
    let stated = first_non_blank([raw.industry_name.as_deref()]);
    if matches!(stated.as_deref(), Some(s) if s != FALLBACK_INDUSTRY) {
        return stated.unwrap_or_default();
    }
    let from_employer = raw
        .positions
        .first()
        .and_then(|p| p.company.as_ref())
        .and_then(|c| c.primary_industry())
        .map(str::to_string);
    from_employer.or(stated).unwrap_or_default()
}

fn experience_years(positions: &[Position], current_year: i32) -> i32 {
    positions
        .iter()
        .filter_map(|p| p.time_period.as_ref()?.start_date.as_ref()?.year)
        .min()
        .map(|earliest| (current_year - earliest).max(0))
        .unwrap_or(0)
}

/// Case-insensitive substring match; the first matching bucket wins.
fn seniority_for(title: &str, experience: i32) -> SeniorityLevel {
    let lower = title.to_lowercase();
    let has = |needle: &str| lower.contains(needle);

    if has("ceo") || has("cto") || has("cfo") || has("chief") {
        SeniorityLevel::CLevel
    } else if has("vp") || has("vice president") {
        SeniorityLevel::Vp
    } else if has("director") || has("manager") {
        SeniorityLevel::Director
    } else if has("senior") || has("lead") || has("principal") {
        SeniorityLevel::Senior
    } else if has("junior") || experience < 2 {
        SeniorityLevel::EntryLevel
    } else {
        SeniorityLevel::MidLevel
    }
}

fn collect_skills(raw: &LinkedInProfile) -> Vec<String> {
    let certifications = raw
        .certifications
        .iter()
        .filter_map(|c| c.label())
        .take(MAX_CERTIFICATIONS);
    let candidates = raw
        .skills
        .iter()
        .chain(raw.courses.iter())
        .filter_map(|s| s.label())
        .chain(certifications);

    let mut skills: Vec<String> = Vec::new();
    for label in candidates {
        if skills.len() == MAX_SKILLS {
            break;
        }
        if !skills.iter().any(|s| s == label) {
            skills.push(label.to_string());
        }
    }
    skills
}

fn format_month_year(date: &YearMonth) -> Option<String> {
    let year = date.year?;
    Some(match date.month {
        Some(month) if (1..=12).contains(&month) => format!("{month:02}/{year}"),
        _ => year.to_string(),
    })
}

fn render_positions(positions: &[Position]) -> String {
    positions
        .iter()
        .filter_map(render_position)
        .collect::<Vec<_>>()
        .join(POSITION_SEPARATOR)
}

fn render_position(position: &Position) -> Option<String> {
    let title = first_non_blank([position.title.as_deref()]);
    let company = first_non_blank([position_company(position)]);
    let mut line = match (title, company) {
        (Some(t), Some(c)) => format!("{t} at {c}"),
        (Some(only), None) | (None, Some(only)) => only,
        (None, None) => return None,
    };

    if let Some(start) = position
        .time_period
        .as_ref()
        .and_then(|tp| tp.start_date.as_ref())
        .and_then(format_month_year)
    {
        let end = position
            .time_period
            .as_ref()
            .and_then(|tp| tp.end_date.as_ref())
            .and_then(format_month_year)
            .unwrap_or_else(|| "Present".to_string());
        line.push_str(&format!(" ({start} - {end})"));
    }
    if let Some(location) = first_non_blank([position.location_name.as_deref()]) {
        line.push_str(&format!(" - {location}"));
    }
    if let Some(description) = first_non_blank([position.description.as_deref()]) {
        line.push('\n');
        line.push_str(&description);
    }
    Some(line)
}

fn year_span(period: Option<&TimePeriod>) -> Option<String> {
    let period = period?;
    let start = period.start_date.as_ref().and_then(|d| d.year);
    let end = period.end_date.as_ref().and_then(|d| d.year);
    match (start, end) {
        (Some(s), Some(e)) => Some(format!("({s}-{e})")),
        (Some(y), None) | (None, Some(y)) => Some(format!("({y})")),
        (None, None) => None,
    }
}

fn render_education(entries: &[Education]) -> String {
    entries
        .iter()
        .filter_map(|edu| {
            let degree = first_non_blank([edu.degree_name.as_deref()]);
            let field = first_non_blank([edu.field_of_study.as_deref()]);
            let school = first_non_blank([edu.school_name.as_deref()]);

            let mut parts: Vec<String> = Vec::new();
            match (degree, field) {
                (Some(d), Some(f)) => parts.push(format!("{d} in {f}")),
                (Some(one), None) | (None, Some(one)) => parts.push(one),
                (None, None) => {}
            }
            if let Some(school) = school {
                if parts.is_empty() {
                    parts.push(school);
                } else {
                    parts.push(format!("at {school}"));
                }
            }
            if parts.is_empty() {
                return None;
            }
            if let Some(span) = year_span(edu.time_period.as_ref()) {
                parts.push(span);
            }
            Some(parts.join(" "))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn company_size(position: Option<&Position>) -> String {
    let Some(range) = position
        .and_then(|p| p.company.as_ref())
        .and_then(|c| c.employee_count_range.as_ref())
    else {
        return String::new();
    };
    match (range.start, range.end) {
        (Some(s), Some(e)) => format!("{s}-{e} employees"),
        (Some(s), None) => format!("{s}+ employees"),
        _ => String::new(),
    }
}
