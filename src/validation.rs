//! Structural validation of skill and project input.
//!
//! Raw request bodies ([`SkillInput`], [`ProjectInput`]) are turned into
//! validated field sets ([`SkillFields`], [`ProjectFields`]). Every problem is
//! reported against the field it belongs to so a form can show it in place.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_path_to_error::Segment;
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

use crate::models::{ProjectFields, ProjectInput, SkillFields, SkillInput};

pub const SKILL_NAME_MAX: usize = 50;
pub const PROJECT_TITLE_MAX: usize = 100;
pub const PROJECT_DESCRIPTION_MAX: usize = 1000;
pub const LEVEL_MIN: i64 = 1;
pub const LEVEL_MAX: i64 = 5;

/// Field key for problems with the request body as a whole.
pub const BODY_FIELD: &str = "body";

/// Field name to the messages raised against it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn field(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Conversion from raw input into validated fields.
pub trait Validate {
    type Output;

    fn validate(self) -> Result<Self::Output, ValidationErrors>;
}

impl Validate for SkillInput {
    type Output = SkillFields;

    fn validate(self) -> Result<SkillFields, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        check_text(
            &mut errors,
            "name",
            &self.name,
            SKILL_NAME_MAX,
            "Skill name is required",
            "Name must be less than 50 characters",
        );

        let level = check_level(&mut errors, self.level);

        check_tokens(
            &mut errors,
            "tags",
            &self.tags,
            "At least one tag is required",
            "Tags must not be empty",
        );

        errors.into_result(SkillFields {
            name: self.name,
            level,
            tags: self.tags,
        })
    }
}

impl Validate for ProjectInput {
    type Output = ProjectFields;

    fn validate(self) -> Result<ProjectFields, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        check_text(
            &mut errors,
            "title",
            &self.title,
            PROJECT_TITLE_MAX,
            "Project title is required",
            "Title must be less than 100 characters",
        );
        check_text(
            &mut errors,
            "description",
            &self.description,
            PROJECT_DESCRIPTION_MAX,
            "Description is required",
            "Description must be less than 1000 characters",
        );
        check_tokens(
            &mut errors,
            "tech_stack",
            &self.tech_stack,
            "At least one technology is required",
            "Technologies must not be empty",
        );

        let link = normalize_link(self.link);
        if let Some(link) = &link {
            if !is_absolute_url(link) {
                errors.add("link", "Must be a valid URL");
            }
        }

        errors.into_result(ProjectFields {
            title: self.title,
            description: self.description,
            tech_stack: self.tech_stack,
            link,
        })
    }
}

/// Decode a JSON request body.
///
/// A body that is not JSON at all is reported under [`BODY_FIELD`]. Missing
/// fields and values of the wrong type are reported against the field they
/// belong to, like any other validation failure.
pub fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ValidationErrors> {
    let deserializer = &mut serde_json::Deserializer::from_slice(body);
    let err = match serde_path_to_error::deserialize(deserializer) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    let mut errors = ValidationErrors::new();
    if !err.inner().is_data() {
        errors.add(BODY_FIELD, "Request body must be valid JSON");
        return Err(errors);
    }

    // serde_json appends the line and column, which mean nothing in a form.
    let detail = err.inner().to_string();
    let detail = detail.split(" at line ").next().unwrap_or_default();

    let field = err.path().iter().find_map(|segment| match segment {
        Segment::Map { key } => Some(key.clone()),
        _ => None,
    });
    match (field, missing_field(detail)) {
        (Some(field), _) => errors.add(field, format!("Invalid value: {detail}")),
        (None, Some(missing)) => errors.add(missing, "This field is required"),
        (None, None) => errors.add(BODY_FIELD, format!("Invalid request body: {detail}")),
    }
    Err(errors)
}

fn missing_field(detail: &str) -> Option<&str> {
    detail.strip_prefix("missing field `")?.split('`').next()
}

/// Whether `level` is a valid skill level.
pub fn level_in_range(level: i64) -> bool {
    (LEVEL_MIN..=LEVEL_MAX).contains(&level)
}

/// Blank links mean "no link".
pub fn normalize_link(link: Option<String>) -> Option<String> {
    link.filter(|l| !l.trim().is_empty())
}

pub fn is_absolute_url(candidate: &str) -> bool {
    Url::parse(candidate).is_ok()
}

fn check_text(
    errors: &mut ValidationErrors,
    field: &str,
    value: &str,
    max: usize,
    required: &str,
    too_long: &str,
) {
    let len = value.chars().count();
    if len == 0 {
        errors.add(field, required);
    } else if len > max {
        errors.add(field, too_long);
    }
}

fn check_level(errors: &mut ValidationErrors, level: i64) -> u8 {
    if level < LEVEL_MIN {
        errors.add("level", "Level must be at least 1");
    } else if level > LEVEL_MAX {
        errors.add("level", "Level must be at most 5");
    }
    level.clamp(LEVEL_MIN, LEVEL_MAX) as u8
}

fn check_tokens(
    errors: &mut ValidationErrors,
    field: &str,
    tokens: &[String],
    required: &str,
    blank: &str,
) {
    if tokens.is_empty() {
        errors.add(field, required);
    } else if tokens.iter().any(|t| t.is_empty()) {
        errors.add(field, blank);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skill(name: &str, level: i64, tags: &[&str]) -> SkillInput {
        SkillInput {
            name: name.to_string(),
            level,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn project(title: &str, description: &str, tech: &[&str], link: Option<&str>) -> ProjectInput {
        ProjectInput {
            title: title.to_string(),
            description: description.to_string(),
            tech_stack: tech.iter().map(|t| t.to_string()).collect(),
            link: link.map(str::to_string),
        }
    }

    #[test]
    fn accepts_valid_skill_unchanged() {
        let fields = skill("React", 4, &["frontend", "javascript"]).validate().unwrap();
        assert_eq!(fields.name, "React");
        assert_eq!(fields.level, 4);
        assert_eq!(fields.tags, vec!["frontend", "javascript"]);
    }

    #[test]
    fn accepts_boundary_levels_and_name_length() {
        assert!(skill("CSS", 1, &["styling"]).validate().is_ok());
        assert!(skill("HTML", 5, &["markup"]).validate().is_ok());
        assert!(skill(&"A".repeat(50), 3, &["tag"]).validate().is_ok());
    }

    #[test]
    fn rejects_invalid_skills_per_field() {
        let errors = skill("", 3, &["tag"]).validate().unwrap_err();
        assert_eq!(errors.field("name").unwrap(), ["Skill name is required"]);

        let errors = skill(&"A".repeat(51), 3, &["tag"]).validate().unwrap_err();
        assert_eq!(errors.field("name").unwrap(), ["Name must be less than 50 characters"]);

        let errors = skill("Python", 0, &["backend"]).validate().unwrap_err();
        assert_eq!(errors.field("level").unwrap(), ["Level must be at least 1"]);

        let errors = skill("TypeScript", 6, &["frontend"]).validate().unwrap_err();
        assert_eq!(errors.field("level").unwrap(), ["Level must be at most 5"]);

        let errors = skill("JavaScript", 4, &[]).validate().unwrap_err();
        assert_eq!(errors.field("tags").unwrap(), ["At least one tag is required"]);

        let errors = skill("Go", 2, &["backend", ""]).validate().unwrap_err();
        assert_eq!(errors.field("tags").unwrap(), ["Tags must not be empty"]);
    }

    #[test]
    fn reports_every_failing_field() {
        let errors = skill("", 9, &[]).validate().unwrap_err();
        let fields: Vec<&str> = errors.fields().map(|(f, _)| f).collect();
        assert_eq!(fields, vec!["level", "name", "tags"]);
    }

    #[test]
    fn name_length_counts_characters() {
        assert!(skill(&"é".repeat(50), 3, &["tag"]).validate().is_ok());
    }

    #[test]
    fn project_link_blank_is_absent() {
        let fields = project("My Project", "A project", &["Vue"], Some(""))
            .validate()
            .unwrap();
        assert_eq!(fields.link, None);

        let fields = project("My Project", "A project", &["Vue"], Some("   "))
            .validate()
            .unwrap();
        assert_eq!(fields.link, None);

        let fields = project("My Project", "A project", &["Angular"], None)
            .validate()
            .unwrap();
        assert_eq!(fields.link, None);
    }

    #[test]
    fn project_link_is_preserved_verbatim() {
        for url in [
            "https://example.com",
            "http://example.com",
            "https://example.com/path",
            "https://subdomain.example.com",
            "https://example.com:3000",
        ] {
            let fields = project("Project", "Description", &["React"], Some(url))
                .validate()
                .unwrap();
            assert_eq!(fields.link.as_deref(), Some(url));
        }
    }

    #[test]
    fn invalid_link_fails_even_when_rest_is_valid() {
        let errors = project("Project", "Description", &["React"], Some("not-a-valid-url"))
            .validate()
            .unwrap_err();
        assert_eq!(errors.field("link").unwrap(), ["Must be a valid URL"]);
        assert!(errors.field("title").is_none());
    }

    #[test]
    fn rejects_invalid_projects() {
        assert!(project("", "Description", &["React"], None).validate().is_err());
        assert!(project(&"A".repeat(101), "Description", &["React"], None)
            .validate()
            .is_err());
        assert!(project("Project", "", &["React"], None).validate().is_err());
        assert!(project("Project", &"A".repeat(1001), &["React"], None)
            .validate()
            .is_err());
        assert!(project("Project", "Description", &[], None).validate().is_err());
        assert!(project(&"A".repeat(100), &"A".repeat(1000), &["React"], None)
            .validate()
            .is_ok());
    }

    #[test]
    fn blank_technology_is_rejected() {
        let errors = project("Project", "Description", &["React", ""], None)
            .validate()
            .unwrap_err();
        assert_eq!(errors.field("tech_stack").unwrap(), ["Technologies must not be empty"]);

        let errors = project("Project", "Description", &[], None).validate().unwrap_err();
        assert_eq!(errors.field("tech_stack").unwrap(), ["At least one technology is required"]);
    }

    #[test]
    fn decode_reports_missing_field_by_name() {
        let errors = decode_json::<SkillInput>(br#"{"name":"x","level":3}"#).unwrap_err();
        assert_eq!(errors.field("tags").unwrap(), ["This field is required"]);
        assert_eq!(errors.fields().count(), 1);
    }

    #[test]
    fn decode_reports_wrong_type_against_its_field() {
        let errors =
            decode_json::<SkillInput>(br#"{"name":"Go","level":"4","tags":["backend"]}"#).unwrap_err();
        let messages = errors.field("level").unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Invalid value: invalid type: string"));
        assert!(!messages[0].contains("line"));

        let errors =
            decode_json::<SkillInput>(br#"{"name":"Go","level":4.5,"tags":["backend"]}"#).unwrap_err();
        assert!(errors.field("level").is_some());

        let errors = decode_json::<SkillInput>(br#"{"name":"Go","level":4,"tags":["a",7]}"#).unwrap_err();
        assert!(errors.field("tags").is_some());
    }

    #[test]
    fn decode_rejects_malformed_and_non_object_bodies() {
        let errors = decode_json::<ProjectInput>(b"{not json").unwrap_err();
        assert_eq!(errors.field(BODY_FIELD).unwrap(), ["Request body must be valid JSON"]);

        let errors = decode_json::<ProjectInput>(b"").unwrap_err();
        assert!(errors.field(BODY_FIELD).is_some());

        let errors = decode_json::<ProjectInput>(b"[1, 2]").unwrap_err();
        assert!(errors.field(BODY_FIELD).unwrap()[0].starts_with("Invalid request body"));
    }

    #[test]
    fn decode_accepts_well_formed_input() {
        let input = decode_json::<ProjectInput>(
            br#"{"title":"Site","description":"Mine","tech_stack":["Rust"]}"#,
        )
        .unwrap();
        assert_eq!(input.title, "Site");
        assert_eq!(input.link, None);
    }

    #[test]
    fn display_joins_field_messages() {
        let errors = skill("", 3, &[]).validate().unwrap_err();
        assert_eq!(
            errors.to_string(),
            "name: Skill name is required; tags: At least one tag is required"
        );
    }
}
