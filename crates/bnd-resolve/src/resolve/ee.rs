//! Execution environments and the capabilities they imply.

use std::fmt;
use std::str::FromStr;

use bnd_version::Version;

use crate::error::BndError;
use crate::namespace;
use crate::resource::Capability;

/// A named Java execution environment.
///
/// Each environment implies `osgi.ee` capabilities for itself and every
/// environment it is compatible with, plus the packages its runtime exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ExecutionEnvironment {
    OsgiMinimum1_0,
    OsgiMinimum1_1,
    OsgiMinimum1_2,
    Jre1_1,
    J2se1_2,
    J2se1_3,
    J2se1_4,
    J2se1_5,
    #[default]
    JavaSe1_6,
    JavaSe1_7,
    JavaSe1_8,
    JavaSe9,
    JavaSe10,
    JavaSe11,
    JavaSe17,
    JavaSe21,
}

use ExecutionEnvironment::*;

const ALL: &[ExecutionEnvironment] = &[
    OsgiMinimum1_0,
    OsgiMinimum1_1,
    OsgiMinimum1_2,
    Jre1_1,
    J2se1_2,
    J2se1_3,
    J2se1_4,
    J2se1_5,
    JavaSe1_6,
    JavaSe1_7,
    JavaSe1_8,
    JavaSe9,
    JavaSe10,
    JavaSe11,
    JavaSe17,
    JavaSe21,
];

const J2SE_1_4_PACKAGES: &[&str] = &[
    "javax.accessibility",
    "javax.crypto",
    "javax.crypto.interfaces",
    "javax.crypto.spec",
    "javax.imageio",
    "javax.naming",
    "javax.naming.directory",
    "javax.net",
    "javax.net.ssl",
    "javax.print",
    "javax.security.auth",
    "javax.security.auth.callback",
    "javax.security.auth.login",
    "javax.security.auth.x500",
    "javax.sql",
    "javax.swing",
    "javax.transaction.xa",
    "javax.xml.parsers",
    "javax.xml.transform",
    "javax.xml.transform.dom",
    "javax.xml.transform.stream",
    "org.ietf.jgss",
    "org.w3c.dom",
    "org.xml.sax",
    "org.xml.sax.ext",
    "org.xml.sax.helpers",
];

const J2SE_1_5_PACKAGES: &[&str] = &[
    "javax.management",
    "javax.management.remote",
    "javax.rmi.ssl",
    "javax.sql.rowset",
    "javax.xml",
    "javax.xml.datatype",
    "javax.xml.namespace",
    "javax.xml.validation",
    "javax.xml.xpath",
];

const JAVASE_1_6_PACKAGES: &[&str] = &[
    "javax.annotation",
    "javax.annotation.processing",
    "javax.jws",
    "javax.lang.model",
    "javax.script",
    "javax.tools",
    "javax.xml.bind",
    "javax.xml.crypto",
    "javax.xml.stream",
    "javax.xml.ws",
];

const JAVASE_1_7_PACKAGES: &[&str] = &["javax.swing.plaf.nimbus"];

const JAVASE_1_8_PACKAGES: &[&str] = &["javax.script", "javax.xml.crypto.dsig"];

impl ExecutionEnvironment {
    pub fn all() -> &'static [ExecutionEnvironment] {
        ALL
    }

    /// The legacy name, e.g. `JavaSE-1.8`
    pub fn ee_name(&self) -> &'static str {
        match self {
            OsgiMinimum1_0 => "OSGi/Minimum-1.0",
            OsgiMinimum1_1 => "OSGi/Minimum-1.1",
            OsgiMinimum1_2 => "OSGi/Minimum-1.2",
            Jre1_1 => "JRE-1.1",
            J2se1_2 => "J2SE-1.2",
            J2se1_3 => "J2SE-1.3",
            J2se1_4 => "J2SE-1.4",
            J2se1_5 => "J2SE-1.5",
            JavaSe1_6 => "JavaSE-1.6",
            JavaSe1_7 => "JavaSE-1.7",
            JavaSe1_8 => "JavaSE-1.8",
            JavaSe9 => "JavaSE-9",
            JavaSe10 => "JavaSE-10",
            JavaSe11 => "JavaSE-11",
            JavaSe17 => "JavaSE-17",
            JavaSe21 => "JavaSE-21",
        }
    }

    /// The `osgi.ee` attribute value; `J2SE-1.4` maps to `JavaSE` version 1.4.
    pub fn capability_name(&self) -> &'static str {
        match self {
            OsgiMinimum1_0 | OsgiMinimum1_1 | OsgiMinimum1_2 => "OSGi/Minimum",
            Jre1_1 => "JRE",
            _ => "JavaSE",
        }
    }

    pub fn capability_version(&self) -> Version {
        match self {
            OsgiMinimum1_0 => Version::new(1, 0, 0),
            OsgiMinimum1_1 | Jre1_1 => Version::new(1, 1, 0),
            OsgiMinimum1_2 | J2se1_2 => Version::new(1, 2, 0),
            J2se1_3 => Version::new(1, 3, 0),
            J2se1_4 => Version::new(1, 4, 0),
            J2se1_5 => Version::new(1, 5, 0),
            JavaSe1_6 => Version::new(1, 6, 0),
            JavaSe1_7 => Version::new(1, 7, 0),
            JavaSe1_8 => Version::new(1, 8, 0),
            JavaSe9 => Version::new(9, 0, 0),
            JavaSe10 => Version::new(10, 0, 0),
            JavaSe11 => Version::new(11, 0, 0),
            JavaSe17 => Version::new(17, 0, 0),
            JavaSe21 => Version::new(21, 0, 0),
        }
    }

    /// Environments this one can stand in for, oldest first.
    pub fn compatible(&self) -> Vec<ExecutionEnvironment> {
        let minimum: &[ExecutionEnvironment] = match self {
            OsgiMinimum1_0 => &[],
            OsgiMinimum1_1 => &[OsgiMinimum1_0],
            OsgiMinimum1_2 | Jre1_1 => &[OsgiMinimum1_0, OsgiMinimum1_1],
            _ => &[OsgiMinimum1_0, OsgiMinimum1_1, OsgiMinimum1_2],
        };
        let mut compatible = minimum.to_vec();
        if *self > Jre1_1 {
            compatible.extend(ALL.iter().copied().filter(|ee| *ee >= Jre1_1 && ee < self));
        }
        compatible
    }

    /// Packages exported by the runtime, without `java.*`
    pub fn packages(&self) -> Vec<&'static str> {
        let mut packages = Vec::new();
        let tiers: [(ExecutionEnvironment, &[&str]); 5] = [
            (J2se1_4, J2SE_1_4_PACKAGES),
            (J2se1_5, J2SE_1_5_PACKAGES),
            (JavaSe1_6, JAVASE_1_6_PACKAGES),
            (JavaSe1_7, JAVASE_1_7_PACKAGES),
            (JavaSe1_8, JAVASE_1_8_PACKAGES),
        ];
        for (since, names) in tiers {
            if *self >= since {
                packages.extend_from_slice(names);
            }
        }
        packages.sort_unstable();
        packages.dedup();
        packages
    }

    /// `osgi.ee` capabilities for this environment and everything it is compatible with.
    ///
    /// Every environment contributes a versioned capability plus one carrying
    /// only the legacy name, so `(osgi.ee=JavaSE-1.6)` filters keep working.
    pub fn capabilities(&self) -> Vec<Capability> {
        std::iter::once(*self)
            .chain(self.compatible())
            .flat_map(|ee| {
                [
                    Capability::new(namespace::EXECUTION_ENVIRONMENT)
                        .with_attribute(namespace::EXECUTION_ENVIRONMENT, ee.capability_name())
                        .with_attribute(namespace::VERSION_ATTRIBUTE, ee.capability_version()),
                    Capability::new(namespace::EXECUTION_ENVIRONMENT)
                        .with_attribute(namespace::EXECUTION_ENVIRONMENT, ee.ee_name()),
                ]
            })
            .collect()
    }
}

impl FromStr for ExecutionEnvironment {
    type Err = BndError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ALL.iter()
            .copied()
            .find(|ee| ee.ee_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| BndError::Config(format!("unknown execution environment \"{}\"", s)))
    }
}

impl fmt::Display for ExecutionEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ee_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Requirement;

    #[test]
    fn test_parse() {
        assert_eq!("JavaSE-1.8".parse::<ExecutionEnvironment>().unwrap(), JavaSe1_8);
        assert_eq!("j2se-1.5".parse::<ExecutionEnvironment>().unwrap(), J2se1_5);
        assert!("JavaSE-0.1".parse::<ExecutionEnvironment>().is_err());
        assert_eq!(ExecutionEnvironment::default(), JavaSe1_6);
    }

    #[test]
    fn test_compatible_chain() {
        let compatible = JavaSe1_6.compatible();
        assert!(compatible.contains(&J2se1_5));
        assert!(compatible.contains(&Jre1_1));
        assert!(compatible.contains(&OsgiMinimum1_2));
        assert!(!compatible.contains(&JavaSe1_7));
        assert!(OsgiMinimum1_0.compatible().is_empty());
    }

    #[test]
    fn test_capabilities_satisfy_modern_and_legacy_filters() {
        let caps = JavaSe1_7.capabilities();
        let matches = |filter: &str| {
            let req = Requirement::with_filter(namespace::EXECUTION_ENVIRONMENT, filter).unwrap();
            caps.iter().any(|cap| req.matches(cap))
        };

        assert!(matches("(&(osgi.ee=JavaSE)(version=1.7))"));
        assert!(matches("(&(osgi.ee=JavaSE)(version=1.5))"));
        assert!(matches("(osgi.ee=JavaSE-1.6)"));
        assert!(matches("(osgi.ee=J2SE-1.4)"));
        assert!(!matches("(&(osgi.ee=JavaSE)(version=1.8))"));
        assert!(!matches("(osgi.ee=JavaSE-1.8)"));
    }

    #[test]
    fn test_packages_grow_with_version() {
        assert!(JavaSe1_6.packages().contains(&"javax.annotation"));
        assert!(!J2se1_5.packages().contains(&"javax.annotation"));
        assert!(OsgiMinimum1_0.packages().is_empty());
    }
}
