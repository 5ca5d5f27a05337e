/// Echo Action
///
/// Returns the given message unchanged, tagged with the caller's request id.

use serde::Deserialize;
use serde_json::json;

use super::invalid_input;
use crate::core::context::ExecutionContext;
use crate::core::registry::{ActionDef, ActionMap, ActionResponse, HttpStatus};
use crate::core::schema::{Describe, Field, RecordDescriptor, TypeDescriptor};

#[derive(Deserialize, Debug)]
pub struct EchoInput {
    pub message: String,
}

impl Describe for EchoInput {
    fn descriptor() -> TypeDescriptor {
        RecordDescriptor::new()
            .field(
                Field::new("message", TypeDescriptor::String)
                    .description("The message to echo")
                    .required(),
            )
            .into()
    }
}

/// Register the echo action.
pub fn register(actions: &mut ActionMap) {
    actions.insert(
        "echo".to_string(),
        ActionDef::new("Echo a message back to the client.", handle)
            .with_input::<EchoInput>()
            .tag("demo"),
    );
}

fn handle(ctx: &ExecutionContext) -> (ActionResponse, HttpStatus) {
    let input: EchoInput = match ctx.bind() {
        Ok(input) => input,
        Err(e) => return invalid_input(e),
    };

    let response = ActionResponse::ok(json!({ "message": input.message }))
        .with_request_id(ctx.request_id());
    (response, 200)
}
