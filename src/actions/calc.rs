/// Calc Action
///
/// Binary arithmetic on two numbers.

use serde::Deserialize;
use serde_json::json;

use super::invalid_input;
use crate::core::context::ExecutionContext;
use crate::core::registry::{ActionDef, ActionMap, ActionResponse, HttpStatus};
use crate::core::schema::{Describe, Field, RecordDescriptor, TypeDescriptor};

#[derive(Deserialize, Debug)]
pub struct CalcInput {
    pub a: f64,
    pub b: f64,
    pub op: String,
}

impl Describe for CalcInput {
    fn descriptor() -> TypeDescriptor {
        RecordDescriptor::new()
            .field(Field::new("a", f64::descriptor()).description("Left operand").required())
            .field(Field::new("b", f64::descriptor()).description("Right operand").required())
            .field(
                Field::new("op", String::descriptor())
                    .description("One of add, sub, mul, div")
                    .required(),
            )
            .into()
    }
}

pub fn register(actions: &mut ActionMap) {
    actions.insert(
        "calc".to_string(),
        ActionDef::new("Apply add, sub, mul or div to two numbers.", handle)
            .with_input::<CalcInput>()
            .tag("demo"),
    );
}

fn handle(ctx: &ExecutionContext) -> (ActionResponse, HttpStatus) {
    let input: CalcInput = match ctx.bind() {
        Ok(input) => input,
        Err(e) => return invalid_input(e),
    };

    let result = match input.op.as_str() {
        "add" => input.a + input.b,
        "sub" => input.a - input.b,
        "mul" => input.a * input.b,
        "div" if input.b == 0.0 => {
            return (ActionResponse::error("DivisionByZero", "cannot divide by zero"), 400);
        }
        "div" => input.a / input.b,
        other => {
            return (
                ActionResponse::error("UnknownOperator", format!("unsupported operator '{other}'")),
                400,
            );
        }
    };

    let response = ActionResponse::ok(json!({ "result": result })).with_request_id(ctx.request_id());
    (response, 200)
}
