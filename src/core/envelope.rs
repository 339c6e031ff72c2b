//! Purpose: Decode the JSON response envelope returned by every libyamlscript request.
//! Exports: `Envelope`.
//! Role: Single place where native JSON text becomes a value or a structured `Error`.
//! Invariants: `error` wins over `data`/`code` when a response carries both.
//! Invariants: A response without `data`, `code`, or `error` is a protocol error, never an empty value.
//! Invariants: `data: null` is a successful result.
use serde_json::{Map, Value};

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Envelope {
    Data(Value),
    Code(String),
    Failure { cause: String, details: Value },
}

impl Envelope {
    pub(crate) fn parse(raw: &str) -> Result<Self, Error> {
        let value: Value = serde_json::from_str(raw).map_err(|err| {
            Error::new(ErrorKind::Protocol)
                .with_message("response is not valid JSON")
                .with_source(err)
        })?;
        let Value::Object(mut obj) = value else {
            return Err(protocol("response is not a JSON object"));
        };

        if let Some(error) = obj.remove("error") {
            return failure(error);
        }
        if let Some(data) = obj.remove("data") {
            return Ok(Envelope::Data(data));
        }
        match obj.remove("code") {
            Some(Value::String(code)) => Ok(Envelope::Code(code)),
            Some(_) => Err(protocol("response `code` is not a string")),
            None => Err(unexpected_shape(&obj)),
        }
    }

    /// Interpret the envelope as the reply to `compile_ys_to_clj`.
    pub(crate) fn into_code(self) -> Result<String, Error> {
        match self {
            Envelope::Code(code) | Envelope::Data(Value::String(code)) => Ok(code),
            Envelope::Data(_) => Err(protocol("compile response `data` is not a string")),
            Envelope::Failure { cause, details } => Err(Error::new(ErrorKind::Compilation)
                .with_message(cause)
                .with_details(details)),
        }
    }

    /// Interpret the envelope as the reply to `eval_ys_to_json`/`load_ys_to_json`.
    pub(crate) fn into_data(self) -> Result<Value, Error> {
        match self {
            Envelope::Data(data) => Ok(data),
            Envelope::Code(_) => Err(protocol("unexpected response shape: expected `data`")),
            Envelope::Failure { cause, details } => Err(Error::new(ErrorKind::Evaluation)
                .with_message(cause)
                .with_details(details)),
        }
    }
}

fn failure(error: Value) -> Result<Envelope, Error> {
    match error.get("cause").and_then(Value::as_str) {
        Some(cause) => Ok(Envelope::Failure {
            cause: cause.to_string(),
            details: error,
        }),
        None => Err(protocol("response `error` has no string `cause`").with_details(error)),
    }
}

fn unexpected_shape(obj: &Map<String, Value>) -> Error {
    let keys = obj.keys().map(String::as_str).collect::<Vec<_>>().join(", ");
    protocol(format!("unexpected response shape (keys: [{keys}])"))
}

fn protocol(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::Protocol).with_message(message)
}
