// Copyright (c) 2025 - Cowboy AI, Inc.
//! TLS certificates with DNS validation

use serde_json::{json, Value};

use crate::deferred::{Deferred, Properties};
use crate::deployment::{Component, Deployment, Registrar, ResourceHandle, ResourceKind, ResourceRequest};
use crate::errors::{StackError, StackResult};
use crate::state_machine::{StageTracker, StateMachine, Step, TransitionError, TransitionResult};

/// DNS zone the validation records go into
#[derive(Debug, Clone)]
pub struct HostedZone {
    pub name: String,
    pub zone_id: Deferred<String>,
}

impl HostedZone {
    pub fn new(name: impl Into<String>, zone_id: impl Into<Deferred<String>>) -> Self {
        Self {
            name: name.into(),
            zone_id: zone_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMethod {
    #[default]
    Dns,
    Email,
    None,
}

impl ValidationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationMethod::Dns => "DNS",
            ValidationMethod::Email => "EMAIL",
            ValidationMethod::None => "NONE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateStage {
    Empty,
    Issued,
    Validated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateStep {
    Certificate,
    DnsValidation,
}

impl Step for CertificateStep {
    fn name(&self) -> &'static str {
        match self {
            CertificateStep::Certificate => "with_certificate",
            CertificateStep::DnsValidation => "with_dns_validation",
        }
    }
}

impl StateMachine for CertificateStage {
    type Input = CertificateStep;
    type Output = ();

    fn transition(&self, step: &CertificateStep) -> TransitionResult<(Self, ())> {
        match (self, step) {
            (CertificateStage::Empty, CertificateStep::Certificate) => Ok((CertificateStage::Issued, ())),
            (_, CertificateStep::Certificate) => Err(TransitionError::already_configured(step, "certificate")),
            (CertificateStage::Empty, CertificateStep::DnsValidation) => Err(TransitionError::out_of_order(
                step,
                "certificate must be defined before DNS validation records",
            )),
            (CertificateStage::Issued, CertificateStep::DnsValidation) => Ok((CertificateStage::Validated, ())),
            (CertificateStage::Validated, CertificateStep::DnsValidation) => {
                Err(TransitionError::already_configured(step, "DNS validation"))
            }
        }
    }
}

/// Certificate for a domain and its subdomains
#[derive(Debug)]
pub struct AcmCertificate {
    component: Component,
    stage: StageTracker<CertificateStage>,
    domain_name: String,
    suffix: String,
    zone: HostedZone,
    output_arn_name: Option<String>,
    certificate: Option<ResourceHandle>,
    validation: Option<ResourceHandle>,
}

impl AcmCertificate {
    /// `suffix` disambiguates several certificates for one domain
    pub fn new(
        deployment: &Deployment,
        domain_name: impl Into<String>,
        suffix: impl Into<String>,
        zone: HostedZone,
        output_arn_name: Option<String>,
    ) -> Self {
        let domain_name = domain_name.into();
        let suffix = suffix.into();
        let component = Component::new(deployment, "AcmCertificate", format!("{domain_name}{suffix}"));
        Self {
            stage: StageTracker::new(component.label(), CertificateStage::Empty),
            component,
            domain_name,
            suffix,
            zone,
            output_arn_name,
            certificate: None,
            validation: None,
        }
    }

    /// Request the certificate; `domain` defaults to `*.{domain_name}`
    pub fn with_certificate(
        mut self,
        validation_method: ValidationMethod,
        domain: Option<&str>,
        transparency_logging: bool,
    ) -> StackResult<Self> {
        self.stage.advance(CertificateStep::Certificate)?;

        let domain = domain
            .map(str::to_string)
            .unwrap_or_else(|| format!("*.{}", self.domain_name));
        let preference = if transparency_logging { "ENABLED" } else { "DISABLED" };
        let certificate = self.component.register(ResourceRequest::new(
            ResourceKind::Certificate,
            format!("cert-{}{}", self.domain_name, self.suffix),
            Properties::new()
                .set("domainName", domain)
                .set("validationMethod", validation_method.as_str())
                .set("options", json!({ "certificateTransparencyLoggingPreference": preference })),
        ))?;

        if let Some(key) = &self.output_arn_name {
            self.component.add_output(key, certificate.arn().map(Value::from));
        }
        self.certificate = Some(certificate);
        Ok(self)
    }

    /// Validation CNAME in the hosted zone plus the certificate validation
    pub fn with_dns_validation(mut self, ttl: u32) -> StackResult<Self> {
        self.stage.advance(CertificateStep::DnsValidation)?;
        let certificate = self.certificate.clone().ok_or_else(|| StackError::ConfigurationOrder {
            builder: self.component.label(),
            step: CertificateStep::DnsValidation.name().to_string(),
            reason: "certificate must be defined before DNS validation records".to_string(),
        })?;

        let option = certificate.output("domainValidationOptions").and_then(|options| {
            options
                .get(0)
                .cloned()
                .ok_or("certificate reported no domain validation options")
        });
        let zone = self.zone.name.clone();
        let record = self.component.register(ResourceRequest::new(
            ResourceKind::DnsRecord,
            format!("cert-validation-cname-{zone}{}", self.suffix),
            Properties::new()
                .set_deferred("name", &validation_field(&option, "resourceRecordName"))
                .set_deferred(
                    "records",
                    &validation_field(&option, "resourceRecordValue").map(|value| vec![value]),
                )
                .set("ttl", ttl)
                .set_deferred("type", &validation_field(&option, "resourceRecordType"))
                .set_deferred("zoneId", &self.zone.zone_id),
        ))?;

        let validation = self.component.register(ResourceRequest::new(
            ResourceKind::CertificateValidation,
            format!("cert-validation-{zone}{}", self.suffix),
            Properties::new()
                .set_deferred("certificateArn", &certificate.arn())
                .set_deferred(
                    "validationRecordFqdns",
                    &record.output_str("fqdn").map(|fqdn| vec![fqdn]),
                ),
        ))?;
        self.validation = Some(validation);
        Ok(self)
    }

    pub fn arn(&self) -> Option<Deferred<String>> {
        self.certificate.as_ref().map(ResourceHandle::arn)
    }

    pub fn certificate(&self) -> Option<&ResourceHandle> {
        self.certificate.as_ref()
    }

    pub fn validation(&self) -> Option<&ResourceHandle> {
        self.validation.as_ref()
    }

    pub fn stage(&self) -> &CertificateStage {
        self.stage.current()
    }
}

fn validation_field(option: &Deferred<Value>, field: &'static str) -> Deferred<String> {
    option.and_then(move |option| {
        option
            .get(field)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| format!("domain validation option has no {field}"))
    })
}
