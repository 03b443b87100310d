//! CI platform detection from environment variables.
//!
//! Platforms are checked in a fixed priority order; the first signature
//! whose condition holds wins. Field sources are reproduced verbatim for
//! downstream report consumers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::env::EnvSnapshot;
use crate::obs;

/// Known CI platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CiPlatform {
    #[serde(rename = "Jenkins")]
    Jenkins,
    #[serde(rename = "CircleCI")]
    CircleCi,
    #[serde(rename = "Travis CI")]
    TravisCi,
    #[serde(rename = "Codeship")]
    Codeship,
    #[serde(rename = "Bitbucket")]
    Bitbucket,
    #[serde(rename = "Drone")]
    Drone,
    #[serde(rename = "Semaphore")]
    Semaphore,
    #[serde(rename = "GitLab")]
    GitLab,
    #[serde(rename = "Buildkite")]
    Buildkite,
    #[serde(rename = "Visual Studio Team Services")]
    Vsts,
}

impl CiPlatform {
    /// Report name of the platform.
    pub fn name(&self) -> &'static str {
        match self {
            CiPlatform::Jenkins => "Jenkins",
            CiPlatform::CircleCi => "CircleCI",
            CiPlatform::TravisCi => "Travis CI",
            CiPlatform::Codeship => "Codeship",
            CiPlatform::Bitbucket => "Bitbucket",
            CiPlatform::Drone => "Drone",
            CiPlatform::Semaphore => "Semaphore",
            CiPlatform::GitLab => "GitLab",
            CiPlatform::Buildkite => "Buildkite",
            CiPlatform::Vsts => "Visual Studio Team Services",
        }
    }
}

impl fmt::Display for CiPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Build identification for the detected platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiInfo {
    pub name: CiPlatform,
    pub build_url: Option<String>,
    pub job_name: Option<String>,
    pub build_number: Option<String>,
}

/// When a signature applies.
#[derive(Debug, Clone, Copy)]
enum Condition {
    /// Any of the variables is set and non-empty.
    AnyNonEmpty(&'static [&'static str]),
    /// All of the variables are set and non-empty.
    AllNonEmpty(&'static [&'static str]),
    /// `CI=true` and the variable equals the value.
    CiAnd(&'static str, &'static str),
    /// The variable equals the value.
    Equals(&'static str, &'static str),
}

impl Condition {
    fn holds(&self, env: &EnvSnapshot) -> bool {
        match *self {
            Condition::AnyNonEmpty(vars) => vars.iter().any(|v| env.non_empty(v).is_some()),
            Condition::AllNonEmpty(vars) => vars.iter().all(|v| env.non_empty(v).is_some()),
            Condition::CiAnd(var, value) => env.is("CI", "true") && env.is(var, value),
            Condition::Equals(var, value) => env.is(var, value),
        }
    }
}

/// Where a reported field comes from.
#[derive(Debug, Clone, Copy)]
enum Field {
    /// Always null.
    Absent,
    /// The variable's value, as set.
    Var(&'static str),
    /// The first non-empty variable.
    FirstNonEmpty(&'static [&'static str]),
    /// Values of the set variables, concatenated.
    Concat(&'static [&'static str]),
}

impl Field {
    fn extract(&self, env: &EnvSnapshot) -> Option<String> {
        match *self {
            Field::Absent => None,
            Field::Var(var) => env.get(var).map(str::to_string),
            Field::FirstNonEmpty(vars) => vars
                .iter()
                .find_map(|v| env.non_empty(v))
                .map(str::to_string),
            Field::Concat(vars) => {
                let parts: Vec<&str> = vars.iter().filter_map(|v| env.get(v)).collect();
                (!parts.is_empty()).then(|| parts.concat())
            }
        }
    }
}

struct Signature {
    platform: CiPlatform,
    condition: Condition,
    build_url: Field,
    job_name: Field,
    build_number: Field,
}

/// Detection table in priority order.
const SIGNATURES: &[Signature] = &[
    Signature {
        platform: CiPlatform::Jenkins,
        condition: Condition::AnyNonEmpty(&["JENKINS_URL", "JENKINS_HOME"]),
        build_url: Field::Var("BUILD_URL"),
        job_name: Field::Var("JOB_NAME"),
        build_number: Field::Var("BUILD_NUMBER"),
    },
    Signature {
        platform: CiPlatform::CircleCi,
        condition: Condition::CiAnd("CIRCLECI", "true"),
        build_url: Field::Var("CIRCLE_BUILD_URL"),
        job_name: Field::Var("CIRCLE_JOB"),
        build_number: Field::Var("CIRCLE_BUILD_NUM"),
    },
    Signature {
        platform: CiPlatform::TravisCi,
        condition: Condition::CiAnd("TRAVIS", "true"),
        build_url: Field::Var("TRAVIS_BUILD_WEB_URL"),
        job_name: Field::Var("TRAVIS_JOB_NAME"),
        build_number: Field::Var("TRAVIS_BUILD_NUMBER"),
    },
    Signature {
        platform: CiPlatform::Codeship,
        condition: Condition::CiAnd("CI_NAME", "codeship"),
        build_url: Field::Absent,
        job_name: Field::Absent,
        build_number: Field::Absent,
    },
    Signature {
        platform: CiPlatform::Bitbucket,
        condition: Condition::AllNonEmpty(&["BITBUCKET_BRANCH", "BITBUCKET_COMMIT"]),
        build_url: Field::Var("BITBUCKET_GIT_HTTP_ORIGIN"),
        job_name: Field::Absent,
        build_number: Field::Var("BITBUCKET_BUILD_NUMBER"),
    },
    Signature {
        platform: CiPlatform::Drone,
        condition: Condition::CiAnd("DRONE", "true"),
        build_url: Field::Var("DRONE_BUILD_LINK"),
        job_name: Field::Absent,
        build_number: Field::Var("DRONE_BUILD_NUMBER"),
    },
    Signature {
        platform: CiPlatform::Semaphore,
        condition: Condition::CiAnd("SEMAPHORE", "true"),
        build_url: Field::Var("SEMAPHORE_ORGANIZATION_URL"),
        job_name: Field::Var("SEMAPHORE_JOB_NAME"),
        build_number: Field::Var("SEMAPHORE_JOB_ID"),
    },
    Signature {
        platform: CiPlatform::GitLab,
        condition: Condition::CiAnd("GITLAB_CI", "true"),
        build_url: Field::Var("CI_JOB_URL"),
        job_name: Field::Var("CI_JOB_NAME"),
        build_number: Field::Var("CI_JOB_ID"),
    },
    Signature {
        platform: CiPlatform::Buildkite,
        condition: Condition::CiAnd("BUILDKITE", "true"),
        build_url: Field::Var("BUILDKITE_BUILD_URL"),
        job_name: Field::FirstNonEmpty(&["BUILDKITE_LABEL", "BUILDKITE_PIPELINE_NAME"]),
        build_number: Field::Var("BUILDKITE_BUILD_NUMBER"),
    },
    Signature {
        platform: CiPlatform::Vsts,
        condition: Condition::Equals("TF_BUILD", "True"),
        build_url: Field::Concat(&["SYSTEM_TEAMFOUNDATIONSERVERURI", "SYSTEM_TEAMPROJECTID"]),
        job_name: Field::Var("SYSTEM_DEFINITIONID"),
        build_number: Field::Var("BUILD_BUILDID"),
    },
];

/// Identify the CI platform described by `env`, if any.
pub fn detect_ci(env: &EnvSnapshot) -> Option<CiInfo> {
    let sig = SIGNATURES.iter().find(|s| s.condition.holds(env))?;
    let info = CiInfo {
        name: sig.platform,
        build_url: sig.build_url.extract(env),
        job_name: sig.job_name.extract(env),
        build_number: sig.build_number.extract(env),
    };
    obs::emit_ci_detected(info.name.name(), info.build_number.as_deref());
    Some(info)
}

/// [`detect_ci`] against the process environment.
pub fn detect_ci_from_process() -> Option<CiInfo> {
    detect_ci(&EnvSnapshot::from_process())
}
