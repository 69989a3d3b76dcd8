//! Binding trigger arguments to pipeline parameters.

use crate::collaborators::PipelineDefinition;
use crate::context::{DispatchContext, POS_ARGS};
use crate::error::DispatchError;
use crate::trigger::Trigger;

/// Result of checking a trigger's named arguments against a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterBinding {
    /// Ambient context with the accepted arguments merged in.
    pub context: DispatchContext,
    /// Argument keys the pipeline does not declare, in key order.
    pub unknown_args: Vec<String>,
}

impl ParameterBinding {
    /// Refuse the binding when any argument was not recognised.
    pub fn into_result(self, trigger: &Trigger) -> Result<DispatchContext, DispatchError> {
        if self.unknown_args.is_empty() {
            Ok(self.context)
        } else {
            Err(DispatchError::UnknownArguments {
                trigger: trigger.display_text().to_string(),
                keys: self.unknown_args,
            })
        }
    }
}

/// Merge declared arguments into a copy of `ambient`.
///
/// Trigger arguments override ambient values of the same name. Positional
/// arguments are joined with `,` into [`POS_ARGS`] and are never checked
/// against the pipeline.
pub fn bind_parameters(
    trigger: &Trigger,
    pipeline: &PipelineDefinition,
    ambient: &DispatchContext,
) -> ParameterBinding {
    let mut context = ambient.clone();
    let mut unknown_args = Vec::new();

    for (key, value) in &trigger.named_args {
        if pipeline.declares(key) {
            context.set(key, value.clone());
        } else {
            unknown_args.push(key.clone());
        }
    }

    if !trigger.positional_args.is_empty() {
        context.set(POS_ARGS, trigger.positional_args.join(","));
    }

    ParameterBinding {
        context,
        unknown_args,
    }
}

/// PR comment listing the arguments a trigger was refused for.
pub fn unknown_arguments_comment(trigger_text: &str, keys: &[String]) -> String {
    format!(
        ":warning: Trigger `{}` contains unknown arguments:\n- `{}`",
        trigger_text.trim(),
        keys.join("`\n- `")
    )
}
