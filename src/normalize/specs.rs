//! GPU specification reference table.
//!
//! Static performance data per GPU model, used to put heterogeneous
//! price quotes on a common cost-per-performance basis. Figures are
//! vendor-published peak throughput; tensor numbers are with sparsity
//! where the vendor quotes it.
//!
//! Absence of a model here is a valid, expected outcome (unknown
//! hardware), not an error.

use crate::types::Precision;

/// Reference data for one GPU model.
#[derive(Debug, Clone, Copy)]
pub struct GpuSpec {
    /// Canonical model key, matched case-insensitively against quote
    /// resource identifiers.
    pub model: &'static str,
    pub tflops_fp32: f64,
    pub tflops_fp16: f64,
    pub tflops_tensor: f64,
    pub memory_gb: u32,
    pub architecture: &'static str,
    pub release_year: u16,
    pub tdp_watts: u32,
}

impl GpuSpec {
    /// Performance figure for the given precision mode.
    pub fn tflops(&self, precision: Precision) -> f64 {
        match precision {
            Precision::Fp32 => self.tflops_fp32,
            Precision::Fp16 => self.tflops_fp16,
            Precision::Tensor => self.tflops_tensor,
        }
    }
}

/// The reference table. Order matters for substring-match tie-breaking:
/// among equal-length candidate keys, the first entry wins.
pub const GPU_SPECS: &[GpuSpec] = &[
    // Data center
    GpuSpec {
        model: "H100",
        tflops_fp32: 51.2,
        tflops_fp16: 989.0,
        tflops_tensor: 1979.0,
        memory_gb: 80,
        architecture: "Hopper",
        release_year: 2022,
        tdp_watts: 700,
    },
    GpuSpec {
        model: "A100",
        tflops_fp32: 19.5,
        tflops_fp16: 312.0,
        tflops_tensor: 624.0,
        memory_gb: 80,
        architecture: "Ampere",
        release_year: 2020,
        tdp_watts: 400,
    },
    GpuSpec {
        model: "A100-40GB",
        tflops_fp32: 19.5,
        tflops_fp16: 312.0,
        tflops_tensor: 624.0,
        memory_gb: 40,
        architecture: "Ampere",
        release_year: 2020,
        tdp_watts: 250,
    },
    GpuSpec {
        model: "V100",
        tflops_fp32: 15.7,
        tflops_fp16: 125.0,
        tflops_tensor: 125.0,
        memory_gb: 32,
        architecture: "Volta",
        release_year: 2017,
        tdp_watts: 300,
    },
    GpuSpec {
        model: "A10",
        tflops_fp32: 31.2,
        tflops_fp16: 125.0,
        tflops_tensor: 250.0,
        memory_gb: 24,
        architecture: "Ampere",
        release_year: 2021,
        tdp_watts: 150,
    },
    GpuSpec {
        model: "T4",
        tflops_fp32: 8.1,
        tflops_fp16: 65.0,
        tflops_tensor: 130.0,
        memory_gb: 16,
        architecture: "Turing",
        release_year: 2018,
        tdp_watts: 70,
    },
    GpuSpec {
        model: "L40",
        tflops_fp32: 90.5,
        tflops_fp16: 181.0,
        tflops_tensor: 362.0,
        memory_gb: 48,
        architecture: "Ada Lovelace",
        release_year: 2022,
        tdp_watts: 300,
    },
    // Consumer
    GpuSpec {
        model: "RTX 4090",
        tflops_fp32: 82.6,
        tflops_fp16: 165.2,
        tflops_tensor: 661.0,
        memory_gb: 24,
        architecture: "Ada Lovelace",
        release_year: 2022,
        tdp_watts: 450,
    },
    GpuSpec {
        model: "RTX 3090",
        tflops_fp32: 35.6,
        tflops_fp16: 71.0,
        tflops_tensor: 142.0,
        memory_gb: 24,
        architecture: "Ampere",
        release_year: 2020,
        tdp_watts: 350,
    },
    GpuSpec {
        model: "RTX 3080",
        tflops_fp32: 29.8,
        tflops_fp16: 59.5,
        tflops_tensor: 119.0,
        memory_gb: 10,
        architecture: "Ampere",
        release_year: 2020,
        tdp_watts: 320,
    },
    GpuSpec {
        model: "RTX 6000 Ada",
        tflops_fp32: 91.1,
        tflops_fp16: 182.0,
        tflops_tensor: 728.0,
        memory_gb: 48,
        architecture: "Ada Lovelace",
        release_year: 2022,
        tdp_watts: 300,
    },
];

/// Look up the spec for a resource identifier.
///
/// Prefers an exact case-insensitive match. Falls back to containment:
/// a table key appearing as a substring of the identifier (so
/// "A100 80GB SXM" resolves to "A100"). Containment ties are broken by
/// longest key first, then table order — "A100-40GB" always beats
/// "A100" for identifiers that mention both.
pub fn lookup(model: &str) -> Option<&'static GpuSpec> {
    let normalized = model.trim().to_uppercase();
    if normalized.is_empty() {
        return None;
    }

    if let Some(spec) = GPU_SPECS
        .iter()
        .find(|s| s.model.to_uppercase() == normalized)
    {
        return Some(spec);
    }

    let mut best: Option<&'static GpuSpec> = None;
    for spec in GPU_SPECS {
        if normalized.contains(&spec.model.to_uppercase()) {
            let longer = match best {
                Some(b) => spec.model.len() > b.model.len(),
                None => true,
            };
            if longer {
                best = Some(spec);
            }
        }
    }
    best
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
