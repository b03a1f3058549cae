//! Relabel rule chains for pod monitor endpoints.
//!
//! The primary chain is built from a fixed sequence of emissions. Later rules
//! can overwrite labels set by earlier ones (the job label override relies on
//! this), so the order below must never depend on the content of the rules.

use crate::error::{Error, Result};
use crate::monitor::{LabelSelectorRequirement, PodMetricsEndpoint, PodMonitor, Port, RelabelRule};
use itertools::Itertools;
use once_cell::sync::Lazy;
use prom_config::relabel::{DEFAULT_REPLACEMENT, DEFAULT_SEPARATOR};
use prom_config::{Action, Regex, RelabelConfig};
use tracing::trace;


/// Holds the original job name before the `job` label gets overwritten.
pub const JOB_NAME_META_LABEL: &str = "__tmp_prometheus_job_name";

const POD_PHASE_LABEL: &str = "__meta_kubernetes_pod_phase";
const POD_NAME_LABEL: &str = "__meta_kubernetes_pod_name";
const POD_LABEL_PREFIX: &str = "__meta_kubernetes_pod_label_";
const POD_LABEL_PRESENT_PREFIX: &str = "__meta_kubernetes_pod_labelpresent_";
const CONTAINER_NAME_LABEL: &str = "__meta_kubernetes_pod_container_name";
const CONTAINER_PORT_NAME_LABEL: &str = "__meta_kubernetes_pod_container_port_name";
const CONTAINER_PORT_NUMBER_LABEL: &str = "__meta_kubernetes_pod_container_port_number";
const NAMESPACE_LABEL: &str = "__meta_kubernetes_namespace";

static INVALID_LABEL_CHAR: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new("[^a-zA-Z0-9_]").expect("label name pattern must compile"));

/// Replace every character that is not valid in a Prometheus label name
/// with `_`.
pub fn sanitize_label_name(name: &str) -> String {
    INVALID_LABEL_CHAR.replace_all(name, "_").into_owned()
}

/// Resolve every unset field of `rule` to the Prometheus default: action
/// `replace`, separator `;`, regex `(.*)` and replacement `$1`.
///
/// Fields that are set are kept as is, even when set to an empty string.
pub fn with_defaults(rule: &RelabelRule) -> Result<RelabelConfig> {
    let action = match &rule.action {
        Some(action) => action
            .parse::<Action>()
            .map_err(|err| Error::validation("action", err))?,
        None => Action::default(),
    };

    let regex = match &rule.regex {
        Some(pattern) => Regex::new(pattern).map_err(|err| Error::validation("regex", err))?,
        None => Regex::default(),
    };

    let config = RelabelConfig {
        source_labels: rule.source_labels.clone(),
        separator: rule
            .separator
            .clone()
            .unwrap_or_else(|| DEFAULT_SEPARATOR.to_string()),
        target_label: rule.target_label.clone(),
        regex,
        modulus: rule.modulus,
        replacement: rule
            .replacement
            .clone()
            .unwrap_or_else(|| DEFAULT_REPLACEMENT.to_string()),
        action,
    };

    validate(&config)?;
    Ok(config)
}

fn validate(config: &RelabelConfig) -> Result<()> {
    let has_target = config
        .target_label
        .as_deref()
        .map(|target| !target.is_empty())
        .unwrap_or(false);

    match config.action {
        Action::Replace | Action::HashMod if !has_target => Err(Error::validation(
            "targetLabel",
            format!("required for {} action", config.action),
        )),
        Action::HashMod if config.modulus.unwrap_or(0) == 0 => Err(Error::validation(
            "modulus",
            "must be greater than zero for hashmod action",
        )),
        _ => Ok(()),
    }
}

/// Accumulates rules, passing each one through [`with_defaults`].
#[derive(Debug, Default)]
struct Relabeler {
    configs: Vec<RelabelConfig>,
}

impl Relabeler {
    fn add(&mut self, rule: RelabelRule) -> Result<()> {
        self.configs.push(with_defaults(&rule)?);
        Ok(())
    }

    /// Append user supplied rules in declaration order. Errors name the
    /// offending entry, e.g. `relabelings[3].regex`.
    fn add_all(&mut self, rules: &[RelabelRule], field: &str) -> Result<()> {
        for (index, rule) in rules.iter().enumerate() {
            let config = with_defaults(rule).map_err(|err| err.within(&format!("{field}[{index}]")))?;
            self.configs.push(config);
        }
        Ok(())
    }
}

fn copy(source: &str, target: &str) -> RelabelRule {
    RelabelRule {
        source_labels: vec![source.to_string()],
        target_label: Some(target.to_string()),
        ..Default::default()
    }
}

/// Like [`copy`], but leaves `target` alone when `source` is empty.
fn copy_non_empty(source: &str, target: &str) -> RelabelRule {
    RelabelRule {
        regex: Some("(.+)".to_string()),
        replacement: Some("${1}".to_string()),
        ..copy(source, target)
    }
}

fn set(target: &str, replacement: String) -> RelabelRule {
    RelabelRule {
        target_label: Some(target.to_string()),
        replacement: Some(replacement),
        ..Default::default()
    }
}

fn filter(action: Action, source_labels: Vec<String>, regex: String) -> RelabelRule {
    RelabelRule {
        source_labels,
        regex: Some(regex),
        action: Some(action.as_str().to_string()),
        ..Default::default()
    }
}

fn pod_label(name: &str) -> String {
    format!("{POD_LABEL_PREFIX}{}", sanitize_label_name(name))
}

fn pod_label_present(name: &str) -> String {
    format!("{POD_LABEL_PRESENT_PREFIX}{}", sanitize_label_name(name))
}

fn match_expression(requirement: &LabelSelectorRequirement) -> Result<RelabelRule> {
    let operator = requirement.operator.as_str();

    match operator {
        "In" | "NotIn" => {
            if requirement.values.is_empty() {
                return Err(Error::validation(
                    "values",
                    format!("must not be empty for operator {operator}"),
                ));
            }
            let action = if operator == "In" {
                Action::Keep
            } else {
                Action::Drop
            };
            Ok(filter(
                action,
                vec![pod_label(&requirement.key), pod_label_present(&requirement.key)],
                format!("({});true", requirement.values.iter().join("|")),
            ))
        }
        "Exists" | "DoesNotExist" => {
            if !requirement.values.is_empty() {
                return Err(Error::validation(
                    "values",
                    format!("must be empty for operator {operator}"),
                ));
            }
            let action = if operator == "Exists" {
                Action::Keep
            } else {
                Action::Drop
            };
            Ok(filter(
                action,
                vec![pod_label_present(&requirement.key)],
                "true".to_string(),
            ))
        }
        _ => Err(Error::validation(
            "operator",
            format!("unknown operator {operator}"),
        )),
    }
}

/// Build the relabel chain that selects and labels the targets of one
/// endpoint of `monitor`.
///
/// Match label values, match expression values and port names are placed
/// into the filter regexes unescaped, so regex metacharacters in them keep
/// their meaning (`a.b` also matches `axb`). Prometheus Operator generates
/// the same rules.
pub fn compile_relabelings(
    monitor: &PodMonitor,
    endpoint: &PodMetricsEndpoint,
) -> Result<Vec<RelabelConfig>> {
    let spec = &monitor.spec;
    let port = endpoint
        .port
        .as_ref()
        .ok_or_else(|| Error::validation("port", "must be set"))?;

    if endpoint.filter_running == Some(false) {
        return Err(Error::unsupported(
            "filterRunning",
            "disabling the pod phase filter",
        ));
    }

    let mut relabeler = Relabeler::default();

    relabeler.add(copy("job", JOB_NAME_META_LABEL))?;
    relabeler.add(filter(
        Action::Drop,
        vec![POD_PHASE_LABEL.to_string()],
        "(Failed|Succeeded)".to_string(),
    ))?;

    if let Some(selector) = &spec.selector {
        for (key, value) in &selector.match_labels {
            relabeler
                .add(filter(
                    Action::Keep,
                    vec![pod_label(key), pod_label_present(key)],
                    format!("({value});true"),
                ))
                .map_err(|err| err.within(&format!("selector.matchLabels[{key}]")))?;
        }

        for (index, requirement) in selector.match_expressions.iter().enumerate() {
            match_expression(requirement)
                .and_then(|rule| relabeler.add(rule))
                .map_err(|err| err.within(&format!("selector.matchExpressions[{index}]")))?;
        }
    }

    let port_filter = match port {
        Port::Name(name) => filter(
            Action::Keep,
            vec![CONTAINER_PORT_NAME_LABEL.to_string()],
            name.clone(),
        ),
        Port::Number(number) => filter(
            Action::Keep,
            vec![CONTAINER_PORT_NUMBER_LABEL.to_string()],
            number.to_string(),
        ),
    };
    relabeler
        .add(port_filter)
        .map_err(|err| err.within("port"))?;

    relabeler.add(copy(NAMESPACE_LABEL, "namespace"))?;
    relabeler.add(copy(CONTAINER_NAME_LABEL, "container"))?;
    relabeler.add(copy(POD_NAME_LABEL, "pod"))?;

    for label in &spec.pod_target_labels {
        relabeler.add(copy_non_empty(&pod_label(label), &sanitize_label_name(label)))?;
    }

    relabeler.add(set(
        "job",
        format!("{}/{}", monitor.metadata.namespace, monitor.metadata.name),
    ))?;

    // Runs after the static job label so it wins whenever the pod has the label.
    if let Some(job_label) = spec.job_label.as_deref().filter(|label| !label.is_empty()) {
        relabeler.add(copy_non_empty(&pod_label(job_label), "job"))?;
    }

    relabeler.add_all(&endpoint.relabelings, "relabelings")?;

    relabeler.add(set("endpoint", port.to_string()))?;

    trace!(
        monitor = %monitor.key(),
        rules = relabeler.configs.len(),
        "Compiled relabel rules"
    );

    Ok(relabeler.configs)
}

/// The metric relabel chain is exactly the user's list, defaulted.
pub fn compile_metric_relabelings(endpoint: &PodMetricsEndpoint) -> Result<Vec<RelabelConfig>> {
    let mut relabeler = Relabeler::default();
    relabeler.add_all(&endpoint.metric_relabelings, "metricRelabelings")?;
    Ok(relabeler.configs)
}
