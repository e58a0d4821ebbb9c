use depot_derive::depot_error;
use std::borrow::Cow;

#[depot_error]
pub enum DemoError {
    #[error("IO error{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Missing{}: {message}", format_context(.context))]
    Missing { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn failing_io() -> Result<(), std::io::Error> {
    Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"))
}

#[test]
fn source_errors_convert_with_question_mark() {
    fn run() -> Result<(), DemoError> {
        failing_io()?;
        Ok(())
    }

    let err = run().expect_err("io error should propagate");
    assert!(matches!(err, DemoError::Io { context: None, .. }));
    assert_eq!(err.to_string(), "IO error: denied");
}

#[test]
fn context_is_attached_to_source_results() {
    let err = failing_io().context("opening shard").expect_err("io error should propagate");
    assert_eq!(err.to_string(), "IO error (opening shard): denied");
}

#[test]
fn context_overrides_on_own_results() {
    let res: Result<(), DemoError> =
        Err(DemoError::Missing { message: "abc123".into(), context: None });
    let err = res.context("reading item").expect_err("should stay an error");
    assert_eq!(err.to_string(), "Missing (reading item): abc123");
}

#[test]
fn internal_variant_accepts_strings() {
    let from_static: DemoError = "boom".into();
    let from_owned: DemoError = String::from("bang").into();

    assert!(matches!(from_static, DemoError::Internal { .. }));
    assert_eq!(from_owned.to_string(), "Internal error: bang");
}
