//! Test fixtures.
//!
//! Fixtures carry only the fields the tests search or sort on and turn
//! themselves into [`IndexedResource`]s with matching index values.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};

use helios_search_sql::backends::sqlite::IndexedResource;

/// Midnight UTC of the given day.
pub fn day(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .expect("valid date")
}

/// A patient fixture for testing.
#[derive(Debug, Clone)]
pub struct PatientFixture {
    /// Patient ID.
    pub id: String,
    /// Indexed `name` values; may be empty.
    pub names: Vec<String>,
    /// Indexed `birthdate`.
    pub birth_date: Option<DateTime<Utc>>,
    /// Logical id of the managing organization.
    pub organization: Option<String>,
}

impl PatientFixture {
    /// Creates a patient without indexed values.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            names: Vec::new(),
            birth_date: None,
            organization: None,
        }
    }

    /// Adds a name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    /// Sets the birth date.
    pub fn with_birth_date(mut self, date: DateTime<Utc>) -> Self {
        self.birth_date = Some(date);
        self
    }

    /// Sets the managing organization.
    pub fn with_organization(mut self, id: impl Into<String>) -> Self {
        self.organization = Some(id.into());
        self
    }

    /// Converts to JSON.
    pub fn to_json(&self) -> Value {
        let mut patient = json!({
            "resourceType": "Patient",
            "id": self.id,
        });
        if !self.names.is_empty() {
            patient["name"] = json!(self.names.iter().map(|n| json!({"family": n})).collect::<Vec<_>>());
        }
        if let Some(date) = &self.birth_date {
            patient["birthDate"] = json!(date.format("%Y-%m-%d").to_string());
        }
        if let Some(org) = &self.organization {
            patient["managingOrganization"] = json!({"reference": format!("Organization/{}", org)});
        }
        patient
    }

    /// Converts to an indexed resource.
    pub fn indexed(&self) -> IndexedResource {
        let mut resource = IndexedResource::new("Patient", &self.id, self.to_json());
        for name in &self.names {
            resource = resource.string("name", name);
        }
        if let Some(date) = self.birth_date {
            resource = resource.date("birthdate", date);
        }
        if let Some(org) = &self.organization {
            resource = resource.reference("organization", "Organization", org);
        }
        resource
    }
}

/// An organization fixture.
pub fn organization(id: &str, name: &str) -> IndexedResource {
    IndexedResource::new(
        "Organization",
        id,
        json!({"resourceType": "Organization", "id": id, "name": name}),
    )
    .string("name", name)
}

/// LOINC, the system [`observation`] codes in.
pub const LOINC: &str = "http://loinc.org";

/// UCUM, the unit system of weight quantities.
pub const UCUM: &str = "http://unitsofmeasure.org";

/// An observation about one or more patients.
pub fn observation(id: &str, code: &str, subjects: &[&str]) -> IndexedResource {
    let subject = subjects
        .first()
        .map(|s| json!({"reference": format!("Patient/{}", s)}))
        .unwrap_or(Value::Null);
    let mut resource = IndexedResource::new(
        "Observation",
        id,
        json!({
            "resourceType": "Observation",
            "id": id,
            "code": {"coding": [{"system": LOINC, "code": code}]},
            "subject": subject,
        }),
    )
    .token("code", Some(LOINC), code);
    for subject in subjects {
        resource = resource.reference("subject", "Patient", subject);
    }
    resource
}

/// A weight observation with a `value-quantity` in kilograms.
pub fn weight(id: &str, kilograms: f64) -> IndexedResource {
    observation(id, "29463-7", &[]).quantity("value-quantity", kilograms, Some("kg"), Some(UCUM))
}

/// An observation coded in `system`, without subjects.
pub fn coded_observation(id: &str, system: &str, code: &str) -> IndexedResource {
    IndexedResource::new(
        "Observation",
        id,
        json!({
            "resourceType": "Observation",
            "id": id,
            "code": {"coding": [{"system": system, "code": code}]},
        }),
    )
    .token("code", Some(system), code)
}

/// An observation with no indexed values.
pub fn bare_observation(id: &str) -> IndexedResource {
    IndexedResource::new(
        "Observation",
        id,
        json!({"resourceType": "Observation", "id": id}),
    )
}

/// Three patients sharing two organizations:
///
/// | id | name  | birthdate  | organization |
/// |----|-------|------------|--------------|
/// | p1 | Adams | 1980-01-01 | o1           |
/// | p2 | Baker | 1990-06-15 | o1           |
/// | p3 | -     | -          | o2           |
pub fn patient_graph() -> Vec<IndexedResource> {
    vec![
        organization("o1", "General Hospital"),
        organization("o2", "City Clinic"),
        organization("o3", "Unreferenced"),
        PatientFixture::new("p1")
            .with_name("Adams")
            .with_birth_date(day(1980, 1, 1))
            .with_organization("o1")
            .indexed(),
        PatientFixture::new("p2")
            .with_name("Baker")
            .with_birth_date(day(1990, 6, 15))
            .with_organization("o1")
            .indexed(),
        PatientFixture::new("p3").with_organization("o2").indexed(),
    ]
}
