use super::read_input;
use crate::error::CliResult;
use hookrelay::{EventDescriptor, WebhookSignature};
use std::path::Path;

/// Print the hex signature of a body.
///
/// With `canonical`, the body is parsed as a descriptor and its canonical
/// form is signed instead of the raw bytes.
pub fn run(secret: &str, body_path: &Path, canonical: bool) -> CliResult<()> {
    let body = read_input(body_path)?;
    let signer = WebhookSignature::new(secret);

    let signature = if canonical {
        signer.sign(&EventDescriptor::from_slice(&body)?)?
    } else {
        signer.sign_bytes(&body)?
    };

    println!("{signature}");
    Ok(())
}
