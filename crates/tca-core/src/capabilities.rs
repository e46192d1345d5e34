//! Model capabilities used by the pipeline
//!
//! Each capability pairs a prompt with the schema of its response type. The
//! standard registry is built and validated once, before any call.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tca_model::{Capability, CapabilityRegistry, RegistryError};
use tca_requirement::{extract_requirement_capability, EXTRACT_REQUIREMENT};

/// Test case generation
pub const GENERATE_TEST_CASES: &str = "generate_test_cases";
/// Per-scenario coverage identification
pub const IDENTIFY_COVERAGE: &str = "identify_coverage";
/// Single false-positive check
pub const VERIFY_FALSE_POSITIVE: &str = "verify_false_positive";

/// Every capability the pipeline requires
pub const REQUIRED: [&str; 4] = [
    GENERATE_TEST_CASES,
    IDENTIFY_COVERAGE,
    VERIFY_FALSE_POSITIVE,
    EXTRACT_REQUIREMENT,
];

/// One generated test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedTestCase {
    /// Identifier in `TC-XXX` form
    pub id: String,
    /// Concise, actionable description
    pub description: String,
}

/// Generation response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TestCaseList {
    pub test_cases: Vec<GeneratedTestCase>,
}

/// Coverage verdict for one test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CoverageVerdict {
    /// Test case id
    pub id: String,
    /// Setup data and an outcome check are both present
    pub present: bool,
    /// Quoted scenario excerpt proving coverage; empty when absent
    pub evidence: String,
}

/// Coverage response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CoverageAnalysis {
    pub test_cases: Vec<CoverageVerdict>,
}

/// Verification response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FalsePositiveCheck {
    /// The coverage claim is unjustified
    pub is_false_positive: bool,
    /// Explanation citing the scenario
    pub reason: String,
    /// Elements the scenario lacks
    pub missing_elements: Vec<String>,
}

const GENERATE_SYSTEM: &str = "You are a software testing expert for safety-critical systems.\n\
\n\
Derive the canonical list of test cases implied by the requirement. For every \
condition the requirement mentions, include:\n\
1. the nominal case where the condition holds and the required behavior occurs;\n\
2. the negation of the condition, where the behavior must not occur;\n\
3. the transition into the satisfied state and the transition out of it;\n\
4. exact boundary values for every threshold (at, just below, just above).\n\
\n\
Give each test case a unique id in TC-XXX form (TC-001, TC-002, ...) and a \
concise, actionable description. Do not merge distinct conditions into one case.";

const GENERATE_USER: &str = "Requirement: {req_name}\n\nDescription:\n{requirement_description}";

const COVERAGE_SYSTEM: &str = "You are a test coverage analyst for scenario files.\n\
\n\
Decide, for each listed test case, whether the scenario actually implements it.\n\
A test case is PRESENT only if the scenario contains BOTH:\n\
- input or setup data matching the test case preconditions, and\n\
- a verification step that checks the expected outcome for that condition.\n\
\n\
A test case is NOT present when it is only named or described in comments, \
titles or free text, when the expected outcome is never checked, or when the \
setup data for that specific case is missing.\n\
\n\
Return one verdict per listed test case using the given ids. For present cases, \
quote the scenario excerpt that proves coverage as evidence; otherwise leave \
evidence empty.";

const COVERAGE_USER: &str = "Requirement: {req_name}\n\
Requirement text:\n{requirement_excerpt}\n\
\n\
Scenario: {scenario_name}\n\
\n\
Test cases to check:\n{test_cases_list}\n\
\n\
Scenario content:\n```\n{scenario_content}\n```";

const VERIFY_SYSTEM: &str = "You are a test verification expert. Your task is to detect FALSE POSITIVES.\n\
\n\
A false positive occurs when a scenario appears to test a case (through its \
name, description or structure) but lacks the implementation that would \
actually verify it.\n\
\n\
Check that the scenario has concrete input values for this test case, steps \
that exercise the behavior, and an assertion on the expected outcome. If any \
of these is missing, report a false positive, explain why citing the scenario, \
and list the missing elements.";

const VERIFY_USER: &str = "Requirement: {req_name}\n\
Scenario: {scenario_name}\n\
\n\
Test case to verify:\n\
- ID: {test_case_id}\n\
- Description: {test_case_description}\n\
- Claimed coverage evidence: {evidence}\n\
\n\
Scenario content:\n```\n{scenario_content}\n```\n\
\n\
Does the scenario fully verify this test case, or is the claim a false positive?";

/// Generation capability
#[must_use]
pub fn generate_test_cases() -> Capability {
    Capability::new::<TestCaseList>(
        GENERATE_TEST_CASES,
        GENERATE_SYSTEM,
        GENERATE_USER,
        &["req_name", "requirement_description"],
    )
}

/// Coverage capability
#[must_use]
pub fn identify_coverage() -> Capability {
    Capability::new::<CoverageAnalysis>(
        IDENTIFY_COVERAGE,
        COVERAGE_SYSTEM,
        COVERAGE_USER,
        &[
            "req_name",
            "requirement_excerpt",
            "scenario_name",
            "test_cases_list",
            "scenario_content",
        ],
    )
}

/// Verification capability
#[must_use]
pub fn verify_false_positive() -> Capability {
    Capability::new::<FalsePositiveCheck>(
        VERIFY_FALSE_POSITIVE,
        VERIFY_SYSTEM,
        VERIFY_USER,
        &[
            "req_name",
            "scenario_name",
            "test_case_id",
            "test_case_description",
            "evidence",
            "scenario_content",
        ],
    )
}

/// Registry holding every pipeline capability, validated
///
/// # Errors
/// `RegistryError` if any definition fails validation
pub fn standard_registry() -> Result<CapabilityRegistry, RegistryError> {
    let mut registry = CapabilityRegistry::new();
    registry.register(generate_test_cases())?;
    registry.register(identify_coverage())?;
    registry.register(verify_false_positive())?;
    registry.register(extract_requirement_capability())?;
    registry.ensure(&REQUIRED)?;
    Ok(registry)
}
