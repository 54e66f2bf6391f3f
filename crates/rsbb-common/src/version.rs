//! ---
//! rsbb_section: "01-core-functionality"
//! rsbb_subsection: "module"
//! rsbb_type: "source"
//! rsbb_scope: "code"
//! rsbb_description: "Build metadata reported by -V, /healthz and build_info."
//! rsbb_version: "v0.1.0"
//! rsbb_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

const UNKNOWN: &str = "unknown";

/// Build metadata baked into every binary by the `build.rs` vergen step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub semver: String,
    pub git_sha: String,
    pub build_timestamp: String,
    pub target: String,
    pub profile: String,
}

impl VersionInfo {
    pub fn current() -> Self {
        Self {
            semver: env!("CARGO_PKG_VERSION").to_owned(),
            git_sha: option_env!("VERGEN_GIT_SHA").unwrap_or(UNKNOWN).to_owned(),
            build_timestamp: option_env!("VERGEN_BUILD_TIMESTAMP")
                .unwrap_or(UNKNOWN)
                .to_owned(),
            target: option_env!("VERGEN_CARGO_TARGET_TRIPLE")
                .unwrap_or(UNKNOWN)
                .to_owned(),
            profile: profile_name(option_env!("VERGEN_CARGO_DEBUG")).to_owned(),
        }
    }

    pub fn cli_string(&self) -> String {
        format!("v{}", self.semver)
    }

    pub fn extended(&self) -> String {
        format!(
            "RSBB dummy robot {} (git {}, {} build for {}, built {})",
            self.cli_string(),
            self.git_sha,
            self.profile,
            self.target,
            self.build_timestamp
        )
    }
}

// vergen reports `VERGEN_CARGO_DEBUG` as "true"/"false".
fn profile_name(debug: Option<&str>) -> &'static str {
    match debug {
        Some("true") => "debug",
        Some("false") => "release",
        _ => UNKNOWN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_script_metadata_is_present() {
        let version = VersionInfo::current();
        assert_eq!(version.semver, env!("CARGO_PKG_VERSION"));
        assert!(option_env!("VERGEN_BUILD_TIMESTAMP").is_some());
        assert!(option_env!("VERGEN_CARGO_TARGET_TRIPLE").is_some());
        assert_ne!(version.target, UNKNOWN);
        assert_ne!(version.profile, UNKNOWN);
    }

    #[test]
    fn extended_string_carries_all_fields() {
        let version = VersionInfo::current();
        let text = version.extended();
        for field in [
            &version.semver,
            &version.git_sha,
            &version.profile,
            &version.target,
            &version.build_timestamp,
        ] {
            assert!(text.contains(field.as_str()), "{text} lacks {field}");
        }
    }

    #[test]
    fn profile_follows_cargo_debug_flag() {
        assert_eq!(profile_name(Some("true")), "debug");
        assert_eq!(profile_name(Some("false")), "release");
        assert_eq!(profile_name(None), "unknown");
    }
}
