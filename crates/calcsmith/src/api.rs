//! Request/response surface for hosting the engine behind a service
//!
//! These types carry the JSON shapes (`calculatorId`, `inputValues`,
//! `knownNames`, ...) a service layer exchanges with its clients. Storage
//! is abstracted behind [`CalculatorRepository`].

use crate::execution::{Engine, ExecutionError, ExecutionReport, InputValues, NodeResult};
use crate::lookup::LookupProvider;
use calcsmith_core::Calculator;
use calcsmith_formula::{validate, ValidationReport};
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;

/// Loads calculator definitions by id
pub trait CalculatorRepository: Sync {
    fn calculator(&self, id: &str) -> impl Future<Output = Option<Calculator>> + Send;
}

impl CalculatorRepository for BTreeMap<String, Calculator> {
    fn calculator(&self, id: &str) -> impl Future<Output = Option<Calculator>> + Send {
        std::future::ready(self.get(id).cloned())
    }
}

/// Run a stored calculator
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ExecutionRequest {
    pub calculator_id: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub input_values: InputValues,
}

/// Result of an [`ExecutionRequest`]
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ExecutionResponse {
    pub success: bool,
    pub results: BTreeMap<String, NodeResult>,
    /// Set when the calculator could not be run at all
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub error: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub primary_result: Option<String>,
}

impl ExecutionResponse {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

impl From<Result<ExecutionReport, ExecutionError>> for ExecutionResponse {
    fn from(result: Result<ExecutionReport, ExecutionError>) -> Self {
        match result {
            Ok(report) => Self {
                success: report.success,
                results: report.results,
                error: None,
                primary_result: report.primary_result,
            },
            Err(error) => Self::failed(error.to_string()),
        }
    }
}

/// Load a calculator, execute it, and shape the response
///
/// Never fails: unknown ids and invalid definitions come back as an
/// unsuccessful response with `error` set.
pub async fn execute_request<R, L>(
    engine: &Engine,
    repository: &R,
    lookup: &L,
    request: &ExecutionRequest,
) -> ExecutionResponse
where
    R: CalculatorRepository,
    L: LookupProvider,
{
    let Some(calc) = repository.calculator(&request.calculator_id).await else {
        return ExecutionResponse::failed(format!(
            "Calculator '{}' not found",
            request.calculator_id
        ));
    };
    engine
        .execute(&calc, &request.input_values, lookup)
        .await
        .into()
}

/// Validate one expression from the editor
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ValidationRequest {
    pub expression: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub known_names: BTreeSet<String>,
}

pub fn validate_request(request: &ValidationRequest) -> ValidationReport {
    validate(&request.expression, &request.known_names)
}
