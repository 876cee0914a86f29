use serde_json::Value;
use tracing::debug;

use scrapline_core::error::{Result, ScraplineError};
use scrapline_core::types::StepDecl;

use super::{optional_str, required_str, StepKind};
use crate::context::StepContext;
use crate::template;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseAction {
    Click,
    DoubleClick,
    Move,
    /// Wheel scroll; the coordinates are the deltas.
    Scroll,
    Down,
    Up,
}

impl MouseAction {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "click" => Some(Self::Click),
            "double-click" | "dblclick" => Some(Self::DoubleClick),
            "move" => Some(Self::Move),
            "scroll" | "wheel" => Some(Self::Scroll),
            "down" => Some(Self::Down),
            "up" => Some(Self::Up),
            _ => None,
        }
    }
}

/// `mouse: "x,y"` with an optional `action` (defaults to click).
#[derive(Debug)]
pub struct MouseStep {
    position: String,
    action: MouseAction,
}

pub(crate) fn build(decl: &StepDecl) -> Result<StepKind> {
    let position = required_str(decl, "mouse", "mouse")?;
    if !template::has_markup(&position) {
        parse_point(&position).map_err(|m| ScraplineError::step_build("mouse", m))?;
    }
    let action = match optional_str(decl, "action", "mouse")? {
        None => MouseAction::Click,
        Some(a) => MouseAction::parse(&a).ok_or_else(|| {
            ScraplineError::step_build("mouse", format!("unknown mouse action {a:?}"))
        })?,
    };
    Ok(StepKind::Mouse(MouseStep { position, action }))
}

impl MouseStep {
    pub async fn execute(&self, ctx: &mut StepContext) -> Result<Option<Value>> {
        let rendered = ctx.render(&self.position)?;
        let (x, y) = parse_point(&rendered).map_err(|message| ScraplineError::StepExecution {
            step: "mouse".into(),
            message,
        })?;
        debug!(x, y, action = ?self.action, "Mouse action");

        let mouse = ctx.driver.mouse();
        match self.action {
            MouseAction::Click => mouse.click(x, y).await?,
            MouseAction::DoubleClick => mouse.dblclick(x, y).await?,
            MouseAction::Move => mouse.move_to(x, y).await?,
            MouseAction::Scroll => mouse.wheel(x, y).await?,
            MouseAction::Down => mouse.down().await?,
            MouseAction::Up => mouse.up().await?,
        }
        Ok(None)
    }
}

/// Parse `"x,y"` into page coordinates.
fn parse_point(s: &str) -> std::result::Result<(f64, f64), String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [x, y] = parts.as_slice() else {
        return Err(format!("expected \"x,y\", got {s:?}"));
    };
    let coord = |c: &str| {
        c.parse::<f64>()
            .map_err(|_| format!("coordinate {c:?} in {s:?} is not a number"))
    };
    Ok((coord(*x)?, coord(*y)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use scrapline_test_utils::{decl, DriverCall, MockDriver};
    use serde_json::json;

    use crate::steps::StepRegistry;
    use crate::vars::VariableStore;

    #[tokio::test]
    async fn test_actions_reach_the_mouse() {
        let mock = MockDriver::new();
        let mut vars = VariableStore::new();
        vars.set_once("x", "2");
        let mut ctx = StepContext::new(Arc::new(mock.clone()), vars);
        let registry = StepRegistry::with_builtins();

        for (action, position) in [
            ("dblclick", "{{ x }},3"),
            ("down", "0,0"),
            ("move", "10.5, 20"),
            ("up", "0,0"),
            ("wheel", "0,-120"),
        ] {
            let step = registry
                .build(decl(json!({"mouse": position, "action": action})))
                .unwrap();
            assert_eq!(step.execute(&mut ctx).await.unwrap(), None);
        }
        let click = registry.build(decl(json!({"mouse": "1,1"}))).unwrap();
        click.execute(&mut ctx).await.unwrap();

        assert_eq!(
            mock.calls(),
            vec![
                DriverCall::MouseDblclick { x: 2.0, y: 3.0 },
                DriverCall::MouseDown,
                DriverCall::MouseMove { x: 10.5, y: 20.0 },
                DriverCall::MouseUp,
                DriverCall::MouseWheel { dx: 0.0, dy: -120.0 },
                DriverCall::MouseClick { x: 1.0, y: 1.0 },
            ]
        );
    }

    #[test]
    fn test_build_rejects_bad_input() {
        let registry = StepRegistry::with_builtins();
        assert!(registry.build(decl(json!({"mouse": "1;2"}))).is_err());
        assert!(registry
            .build(decl(json!({"mouse": "1,2", "action": "triple"})))
            .is_err());
        // Templated positions are only checked when rendered.
        assert!(registry.build(decl(json!({"mouse": "{{ p }}"}))).is_ok());
    }

    #[test]
    fn test_parse_point() {
        assert_eq!(parse_point("10, 20.5"), Ok((10.0, 20.5)));
        assert!(parse_point("10").is_err());
        assert!(parse_point("a,b").is_err());
        assert!(parse_point("1,2,3").is_err());
    }
}
