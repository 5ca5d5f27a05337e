/// Whoami Action
///
/// Reports the account and region the call resolved to, either from the
/// call's own arguments or from the session defaults.

use serde_json::json;

use crate::core::context::ExecutionContext;
use crate::core::registry::{ActionDef, ActionMap, ActionResponse, HttpStatus};

pub fn register(actions: &mut ActionMap) {
    actions.insert(
        "whoami".to_string(),
        ActionDef::new("Report the account and region used for this call.", handle).tag("demo"),
    );
}

fn handle(ctx: &ExecutionContext) -> (ActionResponse, HttpStatus) {
    let Some(account_id) = ctx.account_id() else {
        let response = ActionResponse::error("Unauthorized", "no account id in call or session")
            .with_request_id(ctx.request_id());
        return (response, 401);
    };

    let response = ActionResponse::ok(json!({
        "account_id": account_id,
        "region": ctx.region(),
    }))
    .with_request_id(ctx.request_id());
    (response, 200)
}
