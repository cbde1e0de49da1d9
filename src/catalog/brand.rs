use anyhow::{Result, anyhow};

/// A brand as keyed in the warehouse (`BRD_CD`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Brand {
    pub code: &'static str,
    pub name: &'static str,
}

/// Every brand exported by default, in output order.
pub const BRANDS: &[Brand] = &[
    Brand { code: "M", name: "MLB" },
    Brand { code: "I", name: "MLB KIDS" },
    Brand { code: "X", name: "DISCOVERY" },
    Brand { code: "V", name: "DUVETICA" },
    Brand { code: "ST", name: "SERGIO TACCHINI" },
];

/// Looks up a brand by its warehouse code, ignoring case.
pub fn find_brand(code: &str) -> Result<Brand> {
    let code = code.trim();
    BRANDS
        .iter()
        .copied()
        .find(|b| b.code.eq_ignore_ascii_case(code))
        .ok_or_else(|| {
            let known: Vec<_> = BRANDS.iter().map(|b| b.code).collect();
            anyhow!("Unknown brand code '{}' (known: {})", code, known.join(", "))
        })
}
