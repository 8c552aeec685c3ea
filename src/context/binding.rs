//! Deployment binding: which provider a context uses and which policies apply.

use crate::model::{AuthSource, MessagePolicy, Options, HTTP_SERVLET_LAYER};
use crate::module::MessageInfo;

/// Call property naming the provider id a deployment is bound to.
pub const PROVIDER_ID_PROPERTY: &str = "provider.id";

/// Call property declaring that one policy covers every auth context id.
pub const ONE_POLICY_PROPERTY: &str = "one.policy";

/// Deployment information captured on an adapter's first use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Binding {
    pub provider_id: Option<String>,
    /// The binding describes a single policy regardless of auth context id.
    pub one_policy: bool,
}

/// Request and response policy for one auth context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyPair {
    pub request: Option<MessagePolicy>,
    pub response: Option<MessagePolicy>,
}

/// Supplies the deployment-specific inputs to resolution.
pub trait BindingProvider: Send + Sync {
    /// Read the binding for `layer`/`app_context` from first-use call properties.
    fn bind(&self, layer: &str, app_context: &str, properties: &Options) -> Binding;

    /// Policies for `auth_context_id`. `None` on both sides defers to the
    /// configured policies of the resolved entry.
    fn policies(&self, layer: &str, binding: &Binding, auth_context_id: Option<&str>) -> PolicyPair;

    /// Auth context id of a message for layers without a built-in rule.
    fn auth_context_id(&self, _layer: &str, _message: &MessageInfo) -> Option<String> {
        None
    }
}

/// Binding taken from call properties.
///
/// In the `HttpServlet` layer the auth context id is the message's
/// mandatory flag: `"true"` gets a mandatory sender policy, anything else
/// an optional one. Other layers use the configured policies.
#[derive(Debug, Default, Clone, Copy)]
pub struct PropertyBinding;

impl BindingProvider for PropertyBinding {
    fn bind(&self, layer: &str, _app_context: &str, properties: &Options) -> Binding {
        let provider_id = properties
            .get(PROVIDER_ID_PROPERTY)
            .filter(|id| !id.is_empty())
            .cloned();
        let one_policy = layer == HTTP_SERVLET_LAYER
            || properties
                .get(ONE_POLICY_PROPERTY)
                .is_some_and(|v| v.eq_ignore_ascii_case("true"));
        Binding { provider_id, one_policy }
    }

    fn policies(&self, layer: &str, _binding: &Binding, auth_context_id: Option<&str>) -> PolicyPair {
        if layer != HTTP_SERVLET_LAYER {
            return PolicyPair::default();
        }
        let request = if auth_context_id == Some("true") {
            MessagePolicy::mandatory(AuthSource::Sender)
        } else {
            MessagePolicy::optional(AuthSource::Sender)
        };
        PolicyPair {
            request: Some(request),
            response: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_reads_provider_id() {
        let properties = Options::from([(PROVIDER_ID_PROPERTY.to_string(), "p2".to_string())]);
        let binding = PropertyBinding.bind("SOAP", "app", &properties);
        assert_eq!(binding.provider_id.as_deref(), Some("p2"));
        assert!(!binding.one_policy);

        let binding = PropertyBinding.bind("HttpServlet", "app", &Options::new());
        assert_eq!(binding.provider_id, None);
        assert!(binding.one_policy);
    }

    #[test]
    fn test_servlet_policies_follow_mandatory_flag() {
        let binding = Binding::default();
        let mandatory = PropertyBinding.policies("HttpServlet", &binding, Some("true"));
        assert!(mandatory.request.unwrap().mandatory);
        assert!(mandatory.response.is_none());

        let optional = PropertyBinding.policies("HttpServlet", &binding, Some("false"));
        assert!(!optional.request.unwrap().mandatory);
    }

    #[test]
    fn test_other_layers_defer_to_configuration() {
        let pair = PropertyBinding.policies("SOAP", &Binding::default(), Some("op"));
        assert_eq!(pair, PolicyPair::default());
    }
}
