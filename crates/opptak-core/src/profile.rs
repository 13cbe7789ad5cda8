//! # Applicant Profile
//!
//! The read-only view of an applicant that evaluators work against.
//! Built fresh for every evaluation and never persisted.

use crate::graph::RuleStore;
use crate::{ApplicantId, ApplicantRecord, Document, OpptakError, SubjectRecord};
use chrono::NaiveDate;

/// An applicant with documents and an age derived for one "as of" date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicantProfile {
    pub id: ApplicantId,
    pub name: String,
    /// Whole years between birth date and the reference date, if known.
    pub age: Option<u32>,
    pub documents: Vec<Document>,
}

impl ApplicantProfile {
    /// Derive a profile from a stored record.
    #[must_use]
    pub fn from_record(record: ApplicantRecord, as_of: NaiveDate) -> Self {
        let age = record
            .applicant
            .birth_date
            .and_then(|birth| as_of.years_since(birth));
        Self {
            id: record.applicant.id,
            name: record.applicant.name,
            age,
            documents: record.documents,
        }
    }

    /// Load an applicant from a store. `None` if the applicant is unknown.
    pub fn load<S: RuleStore + ?Sized>(
        store: &S,
        id: ApplicantId,
        as_of: NaiveDate,
    ) -> Result<Option<Self>, OpptakError> {
        Ok(store
            .applicant(id)?
            .map(|record| Self::from_record(record, as_of)))
    }

    /// Every subject record across all documents, in document order.
    pub fn subject_records(&self) -> impl Iterator<Item = &SubjectRecord> {
        self.documents
            .iter()
            .flat_map(|document| document.subject_records.iter())
    }

    /// Documents carrying the given type tag.
    pub fn documents_of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Document> {
        self.documents
            .iter()
            .filter(move |document| document.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Applicant;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn record(birth_date: Option<NaiveDate>) -> ApplicantRecord {
        ApplicantRecord {
            applicant: Applicant {
                id: ApplicantId(1),
                name: "Ola Nordmann".to_string(),
                birth_date,
            },
            documents: vec![
                Document {
                    kind: "vitnemal".to_string(),
                    subject_records: vec![SubjectRecord {
                        code: "REA3022".to_string(),
                        name: "Matematikk R1".to_string(),
                        grade: "4".to_string(),
                        grading_system: "1-6".to_string(),
                        date: None,
                    }],
                },
                Document {
                    kind: "kompetansebevis".to_string(),
                    subject_records: Vec::new(),
                },
            ],
        }
    }

    #[test]
    fn age_counts_whole_years() {
        let profile =
            ApplicantProfile::from_record(record(Some(date(2000, 8, 15))), date(2023, 8, 14));
        assert_eq!(profile.age, Some(22));

        let profile =
            ApplicantProfile::from_record(record(Some(date(2000, 8, 15))), date(2023, 8, 15));
        assert_eq!(profile.age, Some(23));
    }

    #[test]
    fn unknown_or_future_birth_date_has_no_age() {
        let as_of = date(2024, 1, 1);
        assert_eq!(ApplicantProfile::from_record(record(None), as_of).age, None);
        assert_eq!(
            ApplicantProfile::from_record(record(Some(date(2030, 1, 1))), as_of).age,
            None
        );
    }

    #[test]
    fn documents_filter_by_kind() {
        let profile = ApplicantProfile::from_record(record(None), date(2024, 1, 1));
        assert_eq!(profile.documents_of_kind("vitnemal").count(), 1);
        assert_eq!(profile.subject_records().count(), 1);
    }
}
