/// Declares an enum stored as text, with `as_str`, `Display` and `FromStr`.
/// The calling crate needs `serde` as a dependency.
#[macro_export]
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!(
                        "invalid {} '{}', expected one of: {}",
                        stringify!($name).to_lowercase(),
                        other,
                        [$($text),+].join(", ")
                    )),
                }
            }
        }
    };
}

text_enum!(
    /// Lifecycle state of a subscription record.
    SubscriptionStatus {
        Active => "active",
        Cancelled => "cancelled",
        Expired => "expired",
    }
);

text_enum!(Currency {
    Usd => "USD",
    Eur => "EUR",
    Gbp => "GBP",
});

text_enum!(
    /// Billing frequency of a subscription.
    Frequency {
        Daily => "daily",
        Weekly => "weekly",
        Monthly => "monthly",
        Yearly => "yearly",
    }
);

text_enum!(Category {
    Sports => "sports",
    News => "news",
    Entertainment => "entertainment",
    Lifestyle => "lifestyle",
    Technology => "technology",
    Finance => "finance",
    Politics => "politics",
    Other => "other",
});

impl Frequency {
    /// Days added to the start date when no renewal date is given.
    pub fn period_days(&self) -> i64 {
        match self {
            Frequency::Daily => 1,
            Frequency::Weekly => 7,
            Frequency::Monthly => 30,
            Frequency::Yearly => 365,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_round_trips_for_every_variant() {
        for status in SubscriptionStatus::ALL {
            assert_eq!(status.as_str().parse::<SubscriptionStatus>(), Ok(*status));
        }
        for category in Category::ALL {
            assert_eq!(category.to_string().parse::<Category>(), Ok(*category));
        }
    }

    #[test]
    fn unknown_text_lists_allowed_values() {
        let err = "JPY".parse::<Currency>().unwrap_err();
        assert!(err.contains("USD, EUR, GBP"), "{}", err);
    }

    #[test]
    fn serde_uses_stored_text() {
        assert_eq!(serde_json::to_string(&Currency::Eur).unwrap(), "\"EUR\"");
        assert_eq!(
            serde_json::from_str::<Frequency>("\"monthly\"").unwrap(),
            Frequency::Monthly
        );
    }
}
