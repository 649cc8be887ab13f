// ========================================================================================
//                  Static Catalogs: Diseases & Reference Populations
// ========================================================================================
//
// Process-wide read-only configuration. Everything here is compile-time const
// data shared freely across concurrent disease computations; nothing is ever
// mutated after startup.

use crate::types::PopulationParams;

/// One disease the engine can score, tied to its published PGS Catalog score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiseaseInfo {
    /// Catalog key, e.g. "cad" or "breast_cancer".
    pub key: &'static str,
    /// PGS Catalog score ID whose harmonized file carries the weights.
    pub pgs_id: &'static str,
    pub name: &'static str,
    pub category: &'static str,
}

/// Validated, high-quality scores from the PGS Catalog, spanning the major
/// disease categories.
pub const DISEASE_CATALOG: &[DiseaseInfo] = &[
    DiseaseInfo { key: "cad", pgs_id: "PGS000018", name: "Coronary Artery Disease", category: "cardiovascular" },
    DiseaseInfo { key: "afib", pgs_id: "PGS000016", name: "Atrial Fibrillation", category: "cardiovascular" },
    DiseaseInfo { key: "stroke", pgs_id: "PGS000039", name: "Stroke", category: "cardiovascular" },
    DiseaseInfo { key: "hypertension", pgs_id: "PGS000012", name: "Hypertension", category: "cardiovascular" },
    DiseaseInfo { key: "heart_failure", pgs_id: "PGS000115", name: "Heart Failure", category: "cardiovascular" },
    DiseaseInfo { key: "venous_thromboembolism", pgs_id: "PGS000043", name: "Venous Thromboembolism", category: "cardiovascular" },
    DiseaseInfo { key: "breast_cancer", pgs_id: "PGS000004", name: "Breast Cancer", category: "oncology" },
    DiseaseInfo { key: "prostate_cancer", pgs_id: "PGS000662", name: "Prostate Cancer", category: "oncology" },
    DiseaseInfo { key: "colorectal_cancer", pgs_id: "PGS000055", name: "Colorectal Cancer", category: "oncology" },
    DiseaseInfo { key: "lung_cancer", pgs_id: "PGS000070", name: "Lung Cancer", category: "oncology" },
    DiseaseInfo { key: "melanoma", pgs_id: "PGS000066", name: "Melanoma", category: "oncology" },
    DiseaseInfo { key: "ovarian_cancer", pgs_id: "PGS000054", name: "Ovarian Cancer", category: "oncology" },
    DiseaseInfo { key: "t2d", pgs_id: "PGS000014", name: "Type 2 Diabetes", category: "metabolic" },
    DiseaseInfo { key: "t1d", pgs_id: "PGS000021", name: "Type 1 Diabetes", category: "metabolic" },
    DiseaseInfo { key: "obesity", pgs_id: "PGS000027", name: "Obesity", category: "metabolic" },
    DiseaseInfo { key: "alzheimers", pgs_id: "PGS000025", name: "Alzheimer's Disease", category: "neurological" },
    DiseaseInfo { key: "parkinsons", pgs_id: "PGS000903", name: "Parkinson's Disease", category: "neurological" },
    DiseaseInfo { key: "asthma", pgs_id: "PGS000036", name: "Asthma", category: "respiratory" },
    DiseaseInfo { key: "ibd", pgs_id: "PGS000017", name: "Inflammatory Bowel Disease", category: "autoimmune" },
    DiseaseInfo { key: "rheumatoid_arthritis", pgs_id: "PGS000194", name: "Rheumatoid Arthritis", category: "autoimmune" },
    DiseaseInfo { key: "celiac", pgs_id: "PGS000812", name: "Celiac Disease", category: "autoimmune" },
    DiseaseInfo { key: "glaucoma", pgs_id: "PGS000053", name: "Glaucoma", category: "ophthalmologic" },
    DiseaseInfo { key: "amd", pgs_id: "PGS000056", name: "Age-Related Macular Degeneration", category: "ophthalmologic" },
    DiseaseInfo { key: "osteoporosis", pgs_id: "PGS000045", name: "Osteoporosis", category: "musculoskeletal" },
    DiseaseInfo { key: "chronic_kidney_disease", pgs_id: "PGS000110", name: "Chronic Kidney Disease", category: "renal" },
    DiseaseInfo { key: "hypothyroidism", pgs_id: "PGS000095", name: "Hypothyroidism", category: "endocrine" },
];

/// Looks up a disease by its catalog key. Keys are matched case-insensitively
/// with spaces and hyphens folded to underscores.
pub fn disease_info(key: &str) -> Option<&'static DiseaseInfo> {
    let normalized = normalize_key(key);
    DISEASE_CATALOG.iter().find(|d| d.key == normalized)
}

/// Ancestry-specific reference parameters. EUR is the reference population
/// (mean 0, sd 1 by construction); the others carry shifts derived from
/// allele-frequency differences in large biobank validation.
pub const POPULATION_PARAMS: &[PopulationParams] = &[
    PopulationParams { code: "EUR", name: "European", mean: 0.0, sd: 1.0 },
    PopulationParams { code: "AFR", name: "African", mean: 0.2, sd: 1.1 },
    PopulationParams { code: "EAS", name: "East Asian", mean: -0.1, sd: 0.9 },
    PopulationParams { code: "SAS", name: "South Asian", mean: 0.1, sd: 1.0 },
    PopulationParams { code: "AMR", name: "Latino/Admixed American", mean: 0.05, sd: 1.05 },
];

/// Common-language aliases accepted in place of the five standard codes.
const POPULATION_ALIASES: &[(&str, &str)] = &[
    ("european", "EUR"),
    ("caucasian", "EUR"),
    ("white", "EUR"),
    ("african", "AFR"),
    ("black", "AFR"),
    ("african_american", "AFR"),
    ("east_asian", "EAS"),
    ("asian", "EAS"),
    ("chinese", "EAS"),
    ("japanese", "EAS"),
    ("korean", "EAS"),
    ("south_asian", "SAS"),
    ("indian", "SAS"),
    ("latino", "AMR"),
    ("hispanic", "AMR"),
    ("admixed", "AMR"),
    ("mixed", "AMR"),
];

/// Looks up normalization parameters by exact code or documented alias.
pub fn population_params(ancestry: &str) -> Option<&'static PopulationParams> {
    let upper = ancestry.trim().to_ascii_uppercase();
    if let Some(params) = POPULATION_PARAMS.iter().find(|p| p.code == upper) {
        return Some(params);
    }

    let normalized = normalize_key(ancestry);
    let code = POPULATION_ALIASES
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .map(|(_, code)| *code)?;
    POPULATION_PARAMS.iter().find(|p| p.code == code)
}

fn normalize_key(key: &str) -> String {
    key.trim()
        .to_ascii_lowercase()
        .replace([' ', '-'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disease_lookup_normalizes_keys() {
        assert_eq!(disease_info("cad").unwrap().pgs_id, "PGS000018");
        assert_eq!(disease_info("Breast Cancer").unwrap().key, "breast_cancer");
        assert_eq!(disease_info("breast-cancer").unwrap().key, "breast_cancer");
        assert!(disease_info("restless_leg").is_none());
    }

    #[test]
    fn population_lookup_accepts_codes_and_aliases() {
        assert_eq!(population_params("EUR").unwrap().mean, 0.0);
        assert_eq!(population_params("eur").unwrap().code, "EUR");
        assert_eq!(population_params("african").unwrap().code, "AFR");
        assert_eq!(population_params("South Asian").unwrap().code, "SAS");
        assert_eq!(population_params("hispanic").unwrap().code, "AMR");
        assert!(population_params("martian").is_none());
    }

    #[test]
    fn all_population_sds_are_positive() {
        assert!(POPULATION_PARAMS.iter().all(|p| p.sd > 0.0));
    }

    #[test]
    fn catalog_keys_are_unique() {
        let mut keys: Vec<_> = DISEASE_CATALOG.iter().map(|d| d.key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), DISEASE_CATALOG.len());
    }
}
