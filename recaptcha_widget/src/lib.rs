use lazy_static::lazy_static;
use std::error::Error;
use std::fmt;
use tera::{Context, Tera};

#[cfg(test)]
mod tests {
    use super::*;

    const SITE_KEY: &str = "6LeIxAcTAAAAAJcZVRqyHh71UMIEGNQ_MXjiZKhI";

    fn widget() -> Widget {
        Widget::new(SITE_KEY.to_string(), "re_captcha".to_string())
            .expect("widget with a site key should build")
    }

    #[test]
    fn empty_site_key_does_not_build() {
        let err = Widget::new(String::new(), "re_captcha".to_string())
            .expect_err("empty site key should not build a widget");
        match err {
            WidgetError::MissingSiteKey => {},
            err => panic!("invalid error, expected MissingSiteKey: {}", err),
        }
    }

    #[test]
    fn script_url_renders_for_the_site_key() {
        assert_eq!(
            widget().script_url().unwrap(),
            format!("https://www.google.com/recaptcha/api.js?render={}", SITE_KEY),
        );
    }

    #[test]
    fn script_key_is_unique_per_site_key() {
        assert_eq!(
            widget().script_key().unwrap(),
            format!("recaptcha-js-{}", SITE_KEY),
        );
    }

    #[test]
    fn hidden_input_uses_field_id_and_name() {
        let mut widget = widget();
        widget.field_id = "form-captcha".to_string();
        assert_eq!(
            widget.hidden_input().unwrap(),
            r#"<input type="hidden" id="form-captcha" name="re_captcha" value="">"#,
        );
    }

    #[test]
    fn default_field_id_is_the_field_name() {
        let html = widget().hidden_input().unwrap();
        assert_eq!(html, r#"<input type="hidden" id="re_captcha" name="re_captcha" value="">"#);
    }

    #[test]
    fn submit_script_executes_for_the_configured_action() {
        let mut widget = widget();
        widget.action = "login".to_string();
        let js = widget.callback_script().unwrap();
        assert!(js.contains(SITE_KEY));
        assert!(js.contains("{action: 'login'}"));
        assert!(js.contains("#re_captcha"));
        assert!(js.contains("form.submit()"));
        assert!(!js.contains("setInterval"));
    }

    #[test]
    fn preloading_script_keeps_the_token_fresh() {
        let mut widget = widget();
        widget.preloading = true;
        let js = widget.callback_script().unwrap();
        assert!(js.contains(SITE_KEY));
        assert!(js.contains("refreshCaptchaToken"));
        assert!(js.contains("setInterval"));
        assert!(js.contains("#re_captcha"));
    }

    #[test]
    fn badge_stays_visible_by_default() {
        let widget = widget();
        assert!(widget.badge_css().is_none());
        assert!(widget.privacy_hint().is_none());
    }

    #[test]
    fn hidden_badge_comes_with_the_privacy_hint() {
        let mut widget = widget();
        widget.show_badge = false;
        assert_eq!(widget.badge_css(), Some(BADGE_CSS));
        assert_eq!(widget.privacy_hint(), Some(PRIVACY_HINT));
    }
}

pub const DEFAULT_ACTION: &str = "homepage";

/// CSS that hides the floating Google badge
/// (https://developers.google.com/recaptcha/docs/faq).
pub const BADGE_CSS: &str = ".grecaptcha-badge {visibility: hidden;}";

/// Attribution Google requires on pages that hide the badge.
pub const PRIVACY_HINT: &str = "This site is protected by reCAPTCHA and \
the Google <a href='https://policies.google.com/privacy'>Privacy Policy</a> \
and <a href='https://policies.google.com/terms'>Terms of Service</a> apply.";

const NAME_SCRIPT_URL: &str = "script_url";
const NAME_SCRIPT_KEY: &str = "script_key";
const NAME_HIDDEN_INPUT: &str = "hidden_input";
const NAME_ON_SUBMIT: &str = "on_submit";
const NAME_PRELOADING: &str = "preloading";

const TMPL_SCRIPT_URL: &str = "https://www.google.com/recaptcha/api.js?render={{ site_key }}";

const TMPL_SCRIPT_KEY: &str = "recaptcha-js-{{ site_key }}";

const TMPL_HIDDEN_INPUT: &str =
    r#"<input type="hidden" id="{{ field_id }}" name="{{ field_name }}" value="">"#;

const TMPL_ON_SUBMIT: &str = r#"grecaptcha.ready(function() {
    let form = document.querySelector('#{{ field_id }}').closest('form');
    let reCaptchaField = document.querySelector('#{{ field_id }}');

    form.onsubmit = (e) => {
        e.preventDefault();

        grecaptcha
            .execute('{{ site_key }}', {action: '{{ action }}'})
            .then(function(token) {
                reCaptchaField.value = token;
                form.submit();
            });
    };
});"#;

const TMPL_PRELOADING: &str = r#"let reCaptchaTaskID = undefined;

function refreshCaptchaToken(formField) {
    grecaptcha
        .execute('{{ site_key }}', {action: '{{ action }}'})
        .then(
            function (token) {
                formField.value = token;
                console.debug('reCaptcha token was set');
            }
        );

    if (!reCaptchaTaskID) {
        reCaptchaTaskID = setInterval(
            function () {
                refreshCaptchaToken(formField);
            },
            1000 * 60 * 2
        );
    }
}

grecaptcha.ready(function() {
    let form = document.querySelector('#{{ field_id }}').closest('form');
    let reCaptchaField = document.querySelector('#{{ field_id }}');

    refreshCaptchaToken(reCaptchaField);

    form.onsubmit = (e) => {
        refreshCaptchaToken(reCaptchaField);
    };
});"#;

lazy_static! {
    static ref TEMPLATES: Tera = {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (NAME_SCRIPT_URL, TMPL_SCRIPT_URL),
            (NAME_SCRIPT_KEY, TMPL_SCRIPT_KEY),
            (NAME_HIDDEN_INPUT, TMPL_HIDDEN_INPUT),
            (NAME_ON_SUBMIT, TMPL_ON_SUBMIT),
            (NAME_PRELOADING, TMPL_PRELOADING),
        ]).unwrap();
        tera
    };
}

#[derive(Debug)]
pub enum WidgetError {
    MissingSiteKey,
    Render(tera::Error),
}

impl fmt::Display for WidgetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSiteKey => write!(f, "Google reCAPTCHA site key must be specified!"),
            Self::Render(err) => write!(f, "rendering widget snippet failed: {}", err),
        }
    }
}

impl Error for WidgetError {}

/// Renders the pieces a page needs to submit a form protected by reCAPTCHA
/// v3: a hidden input the token lands in, the Google API script include, and
/// the callback snippet that fills the input before the form is submitted.
#[derive(Debug)]
pub struct Widget {
    site_key: String,
    /// Name of the form field the token is written into.
    pub field_name: String,
    /// DOM id of the hidden input.
    pub field_id: String,
    pub action: String,
    pub show_badge: bool,
    /// Fetch a token at page load and refresh it every two minutes instead
    /// of fetching one when the form is submitted.
    pub preloading: bool,
}

impl Widget {
    pub fn new(site_key: String, field_name: String) -> Result<Widget, WidgetError> {
        if site_key.is_empty() {
            return Err(WidgetError::MissingSiteKey);
        }

        let field_id = field_name.clone();
        Ok(Self {
            site_key,
            field_name,
            field_id,
            action: DEFAULT_ACTION.to_string(),
            show_badge: true,
            preloading: false,
        })
    }

    fn context(&self) -> Context {
        let mut ctx = Context::new();
        ctx.insert("site_key", &self.site_key);
        ctx.insert("action", &self.action);
        ctx.insert("field_id", &self.field_id);
        ctx.insert("field_name", &self.field_name);
        ctx
    }

    fn render(&self, name: &str) -> Result<String, WidgetError> {
        TEMPLATES.render(name, &self.context()).map_err(WidgetError::Render)
    }

    /// URL of the Google API script to include in the page head.
    pub fn script_url(&self) -> Result<String, WidgetError> {
        self.render(NAME_SCRIPT_URL)
    }

    /// Key the host page can use to include the API script only once.
    pub fn script_key(&self) -> Result<String, WidgetError> {
        self.render(NAME_SCRIPT_KEY)
    }

    pub fn hidden_input(&self) -> Result<String, WidgetError> {
        self.render(NAME_HIDDEN_INPUT)
    }

    /// The snippet wiring token retrieval to the surrounding form, in the
    /// on-submit or preloading variant depending on configuration.
    pub fn callback_script(&self) -> Result<String, WidgetError> {
        if self.preloading {
            self.render(NAME_PRELOADING)
        } else {
            self.render(NAME_ON_SUBMIT)
        }
    }

    /// CSS hiding the badge, when the widget is configured to hide it.
    pub fn badge_css(&self) -> Option<&'static str> {
        if self.show_badge {
            None
        } else {
            Some(BADGE_CSS)
        }
    }

    /// The attribution hint, only on pages where the badge is hidden.
    pub fn privacy_hint(&self) -> Option<&'static str> {
        if self.show_badge {
            None
        } else {
            Some(PRIVACY_HINT)
        }
    }
}
