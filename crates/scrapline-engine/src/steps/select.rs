use serde_json::Value;
use tracing::debug;

use scrapline_core::error::{Result, ScraplineError};
use scrapline_core::types::{SelectOptions, SelectValues, StepDecl};

use super::{load_params, required_str, single_or_multi, StepKind};
use crate::context::StepContext;

/// `select`: pick `<option>`s by value, label, value-or-label or index.
///
/// Every list is templated independently and all of them are sent together.
#[derive(Debug)]
pub struct SelectStep {
    locator: String,
    values: Vec<String>,
    labels: Vec<String>,
    values_or_labels: Vec<String>,
    indexes: Vec<String>,
    params: SelectOptions,
}

pub(crate) fn build(decl: &StepDecl) -> Result<StepKind> {
    let step = SelectStep {
        locator: required_str(decl, "select", "select")?,
        values: single_or_multi(decl, "value", "select")?,
        labels: single_or_multi(decl, "label", "select")?,
        values_or_labels: single_or_multi(decl, "value_or_label", "select")?,
        indexes: single_or_multi(decl, "index", "select")?,
        params: load_params(decl, "select")?,
    };
    if step.values.is_empty()
        && step.labels.is_empty()
        && step.values_or_labels.is_empty()
        && step.indexes.is_empty()
    {
        return Err(ScraplineError::step_build(
            "select",
            "needs at least one of value, label, value_or_label or index",
        ));
    }
    Ok(StepKind::Select(step))
}

impl SelectStep {
    pub async fn execute(&self, ctx: &mut StepContext) -> Result<Option<Value>> {
        let locator = ctx.render(&self.locator)?;
        let indexes = ctx
            .render_all(&self.indexes)?
            .into_iter()
            .map(|i| {
                i.trim().parse::<usize>().map_err(|_| ScraplineError::StepExecution {
                    step: "select".into(),
                    message: format!("index {i:?} is not a non-negative integer"),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let values = SelectValues {
            values: ctx.render_all(&self.values)?,
            labels: ctx.render_all(&self.labels)?,
            values_or_labels: ctx.render_all(&self.values_or_labels)?,
            indexes,
        };

        debug!(locator = %locator, ?values, "Selecting options");
        let selected = ctx
            .driver
            .locate(&locator)
            .select_option(values, self.params.clone())
            .await?;
        Ok(Some(Value::from(selected)))
    }
}
