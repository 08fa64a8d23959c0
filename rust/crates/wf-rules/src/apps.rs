//! Application id normalization (spec.md §4.4).
//!
//! Accepts snake_case, kebab-case, and case-insensitive variants of a
//! canonical app identifier and maps them to the mixed-case canonical form
//! (e.g. `blast` / `BLAST` -> `Homology`).

use once_cell::sync::Lazy;
use std::collections::HashMap;

static FRIENDLY_NAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("blast", "Homology"),
        ("homology", "Homology"),
        ("genome_annotation", "GenomeAnnotation"),
        ("annotation", "GenomeAnnotation"),
        ("comprehensive_genome_analysis", "ComprehensiveGenomeAnalysis"),
        ("cga", "ComprehensiveGenomeAnalysis"),
        ("bacterial_genome_tree", "CodonTree"),
        ("codon_tree", "CodonTree"),
        ("create_group", "CreateGroup"),
        ("group_creation", "CreateGroup"),
        ("variation", "Variation"),
        ("variation_analysis", "Variation"),
        ("rnaseq", "RNASeq"),
        ("rna_seq", "RNASeq"),
        ("metagenomic_binning", "MetagenomicBinning"),
        ("binning", "MetagenomicBinning"),
        ("proteome_comparison", "ProteomeComparison"),
        ("phylogenetic_tree", "PhylogeneticTree"),
        ("genome_assembly", "GenomeAssembly"),
        ("assembly", "GenomeAssembly"),
        ("taxonomic_classification", "TaxonomicClassification"),
    ])
});

/// The canonical forms this registry recognizes (used to decide whether an
/// already-canonical, differently-cased input should be normalized).
fn known_canonical_forms() -> impl Iterator<Item = &'static &'static str> {
    FRIENDLY_NAMES.values()
}

/// Normalize a raw `app` identifier to its canonical mixed-case form. Inputs
/// that don't match any known alias or canonical form (case-insensitively)
/// are passed through unchanged — an unknown app simply has no registered
/// validator/defaults/coercion rules, which the compiler tolerates.
pub fn normalize_app(raw: &str) -> String {
    for canon in known_canonical_forms() {
        if canon.eq_ignore_ascii_case(raw) {
            return (*canon).to_string();
        }
    }
    let key = raw.to_ascii_lowercase().replace('-', "_");
    if let Some(canon) = FRIENDLY_NAMES.get(key.as_str()) {
        return (*canon).to_string();
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_map_to_canonical() {
        assert_eq!(normalize_app("blast"), "Homology");
        assert_eq!(normalize_app("BLAST"), "Homology");
        assert_eq!(normalize_app("bacterial_genome_tree"), "CodonTree");
        assert_eq!(normalize_app("bacterial-genome-tree"), "CodonTree");
    }

    #[test]
    fn canonical_case_insensitive_variants_normalize() {
        assert_eq!(normalize_app("ComprehensiveGenomeAnalysis"), "ComprehensiveGenomeAnalysis");
        assert_eq!(normalize_app("comprehensivegenomeanalysis"), "ComprehensiveGenomeAnalysis");
        assert_eq!(normalize_app("cga"), "ComprehensiveGenomeAnalysis");
    }

    #[test]
    fn unknown_app_passes_through() {
        assert_eq!(normalize_app("SomeFutureApp"), "SomeFutureApp");
    }
}
