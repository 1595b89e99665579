//! Well-known OSGi namespaces, attributes and directives

pub const IDENTITY: &str = "osgi.identity";
pub const CONTENT: &str = "osgi.content";
pub const PACKAGE: &str = "osgi.wiring.package";
pub const BUNDLE: &str = "osgi.wiring.bundle";
pub const HOST: &str = "osgi.wiring.host";
pub const EXECUTION_ENVIRONMENT: &str = "osgi.ee";

pub const VERSION_ATTRIBUTE: &str = "version";
pub const BUNDLE_VERSION_ATTRIBUTE: &str = "bundle-version";
pub const TYPE_ATTRIBUTE: &str = "type";
pub const CONTENT_URL_ATTRIBUTE: &str = "url";
pub const CONTENT_SIZE_ATTRIBUTE: &str = "size";
pub const CONTENT_MIME_ATTRIBUTE: &str = "mime";

pub const FILTER_DIRECTIVE: &str = "filter";
pub const EFFECTIVE_DIRECTIVE: &str = "effective";
pub const RESOLUTION_DIRECTIVE: &str = "resolution";
pub const USES_DIRECTIVE: &str = "uses";

pub const EFFECTIVE_RESOLVE: &str = "resolve";
pub const EFFECTIVE_ACTIVE: &str = "active";
pub const RESOLUTION_OPTIONAL: &str = "optional";

pub const TYPE_BUNDLE: &str = "osgi.bundle";
pub const TYPE_FRAGMENT: &str = "osgi.fragment";
pub const MIME_JAR: &str = "application/vnd.osgi.bundle";

/// Alias the framework bundle answers to on bundle and host capabilities
pub const SYSTEM_BUNDLE_ALIAS: &str = "system.bundle";

/// Package exported by every OSGi framework implementation
pub const FRAMEWORK_PACKAGE: &str = "org.osgi.framework";

/// Identity prefix reserved for execution environment pseudo bundles
pub const EE_IDENTITY_PREFIX: &str = "ee.";
