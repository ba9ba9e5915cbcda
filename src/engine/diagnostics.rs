use std::collections::HashMap;
use std::fmt::Write;
use std::time::{Duration, Instant};

use crate::engine::Model;

#[derive(Debug, Clone)]
pub struct TaskExecution {
    pub start: Instant,
    pub duration: Duration,
}

/// Per-task timings of a single evaluation.
///
/// Returned by [`Model::evaluate_with_diagnostics`]. Useful for finding the
/// module that dominates the cost of a log-probability call.
#[derive(Debug, Default)]
pub struct Diagnostics {
    /// Execution metrics keyed by task identifier.
    pub execution_times: HashMap<String, TaskExecution>,
}

impl Diagnostics {
    /// Wall time spent inside modules.
    pub fn total(&self) -> Duration {
        self.execution_times.values().map(|t| t.duration).sum()
    }

    /// The task that took the longest, if any ran.
    pub fn slowest(&self) -> Option<(&str, Duration)> {
        self.execution_times
            .iter()
            .max_by_key(|(_, t)| t.duration)
            .map(|(id, t)| (id.as_str(), t.duration))
    }

    /// Renders the model as a Mermaid diagram, color-coded by duration.
    ///
    /// * **Green**: fast
    /// * **Yellow**: moderate
    /// * **Red**: slow
    /// * **Blue**: not run
    pub fn render_mermaid(&self, model: &Model) -> String {
        let mut f = String::new();
        let _ = writeln!(f, "graph LR");

        let secs = self.execution_times.values().map(|t| t.duration.as_secs_f64());
        let min_time = secs.clone().fold(f64::INFINITY, f64::min);
        let max_time = secs.fold(f64::NEG_INFINITY, f64::max);

        let (min_time, span) = if min_time > max_time {
            (0.0, 1.0)
        } else if max_time - min_time < f64::EPSILON {
            (min_time, 1.0)
        } else {
            (min_time, max_time - min_time)
        };

        for index in model.stack.iter() {
            let task = &model.graph[index];
            let name = task.id.replace('"', "\\\"");

            let (label, color) = match self.execution_times.get(&task.id) {
                Some(exec) => {
                    let t = (exec.duration.as_secs_f64() - min_time) / span;
                    (format!("{:.2?}", exec.duration), gradient(t))
                }
                None => ("not run".to_string(), "#ADD8E6".to_string()),
            };

            let _ = writeln!(f, "    {}[\"{}\\n{}\"]", index.index(), name, label);
            let _ = writeln!(f, "    style {} fill:{}", index.index(), color);

            if model.is_output(index) {
                let _ = writeln!(f, "    {} --> Output", index.index());
            }
        }

        let _ = writeln!(f, "    Output[Output]");

        for edge in model.graph.raw_edges() {
            let _ = writeln!(
                f,
                "    {} --> {}",
                edge.source().index(),
                edge.target().index()
            );
        }

        f
    }
}

/// Green at 0, yellow at 0.5, red at 1.
fn gradient(t: f64) -> String {
    let t = t.clamp(0.0, 1.0);
    let (r, g) = if t < 0.5 {
        ((255.0 * t * 2.0) as u8, 255)
    } else {
        (255, (255.0 * (1.0 - (t - 0.5) * 2.0)) as u8)
    };

    format!("#{r:02X}{g:02X}00")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Namespace;
    use crate::engine::tests::model;

    #[test]
    fn test_gradient_ends() {
        assert_eq!(gradient(0.0), "#00FF00");
        assert_eq!(gradient(0.5), "#FFFF00");
        assert_eq!(gradient(1.0), "#FF0000");
        assert_eq!(gradient(7.0), "#FF0000");
    }

    #[test]
    fn test_totals() {
        let now = Instant::now();
        let mut diagnostics = Diagnostics::default();
        for (id, ms) in [("a", 3), ("b", 5)] {
            diagnostics.execution_times.insert(
                id.to_string(),
                TaskExecution {
                    start: now,
                    duration: Duration::from_millis(ms),
                },
            );
        }

        assert_eq!(diagnostics.total(), Duration::from_millis(8));
        assert_eq!(diagnostics.slowest(), Some(("b", Duration::from_millis(5))));
        assert_eq!(Diagnostics::default().slowest(), None);
    }

    #[test]
    fn test_render_mermaid() {
        let model = model(
            r#"{
                "obj": { "kind": "objective", "inputs": "lc" },
                "lc": { "kind": "observable", "inputs": "t" },
                "t": { "kind": "array" }
            }"#,
        );
        let (_, diagnostics) = model.evaluate_with_diagnostics(Namespace::new()).unwrap();
        let mermaid = diagnostics.render_mermaid(&model);

        assert!(mermaid.starts_with("graph LR\n"));
        assert_eq!(mermaid.matches("    style ").count(), model.len());
        for index in 0..model.len() {
            assert!(mermaid.contains(&format!("    style {index} fill:#")), "{mermaid}");
        }

        assert_eq!(mermaid.matches("--> Output").count(), 2);
        assert!(mermaid.contains("    2 --> 1\n"), "{mermaid}");
        assert!(mermaid.contains("    1 --> 0\n"), "{mermaid}");
        assert!(!mermaid.contains("not run"), "{mermaid}");

        let empty = Diagnostics::default().render_mermaid(&model);
        assert_eq!(empty.matches("not run").count(), model.len());
        assert_eq!(empty.matches("fill:#ADD8E6").count(), model.len());
    }
}
