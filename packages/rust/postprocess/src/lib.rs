//! Post-build cleanup of the rendered site.
//!
//! Two text transforms run after the site builder:
//! - [`html`] strips plotly bootstrap scripts from built pages;
//! - [`search_index`] strips the same scripts (and the notebook CSS
//!   loader) from the search index.

pub mod html;
pub mod search_index;

pub use html::{
    collapse_then_continuation, strip_html_file, strip_plotly_bootstrap, strip_plotly_wrappers,
    strip_require_preamble, strip_site_html,
};
pub use search_index::{
    strip_css_loader, strip_plotly_env, strip_search_index_file, strip_search_index_value,
};
