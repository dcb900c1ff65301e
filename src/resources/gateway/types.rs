// Copyright (c) 2025 - Cowboy AI, Inc.
//! Gateway wire enums

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum!(HttpMethod {
    Delete => "DELETE",
    Get => "GET",
    Patch => "PATCH",
    Post => "POST",
    Put => "PUT",
});

wire_enum!(AuthorizationMethod {
    None => "NONE",
    Custom => "CUSTOM",
    AwsIam => "AWS_IAM",
    CognitoUserPools => "COGNITO_USER_POOLS",
});

wire_enum!(
    /// Backend kind behind a method
    IntegrationType {
        Http => "HTTP",
        Mock => "MOCK",
        Aws => "AWS",
        AwsProxy => "AWS_PROXY",
        HttpProxy => "HTTP_PROXY",
    }
);

wire_enum!(PassThroughBehavior {
    WhenNoMatch => "WHEN_NO_MATCH",
    WhenNoTemplates => "WHEN_NO_TEMPLATES",
    Never => "NEVER",
});

wire_enum!(
    /// Where a request parameter is read from
    RequestParamType {
        Header => "header",
        Query => "querystring",
        Path => "path",
    }
);

wire_enum!(EndpointType {
    Regional => "REGIONAL",
    Edge => "EDGE",
});
