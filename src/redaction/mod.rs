/// Content-sensitive alert redaction
///
/// Unauthenticated subscribers receive alerts with sensitive content
/// removed. The level is derived from the alert descriptor (its
/// description text) through two startup-initialized tables:
/// a primary exact-match table and a secondary substring table consulted
/// only when the primary yields Normal.
///
/// Redaction is an explicit per-field operation for each level; the
/// returned alert is a fully independent copy of the input.
use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::models::Alert;

/// Replacement text written into redacted string fields
pub const REDACTED: &str = "[Redacted]";

/// The level of redaction to apply to an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedactionLevel {
    /// Redact the always-redacted field set only
    Normal,
    /// Normal, plus location data
    Partial,
    /// Everything except id, stamp, and status
    Full,
}

// ============================================================================
// DESCRIPTOR TABLES
// ============================================================================

/// Primary table: canonical descriptor key -> level, exact match
static PRIMARY_REDACTION: Lazy<HashMap<&'static str, RedactionLevel>> = Lazy::new(|| {
    PRIMARY_TABLE.iter().copied().collect()
});

/// Secondary table: substring match, first match wins in table order
static SECONDARY_REDACTION: &[(&str, RedactionLevel)] = &[("med", RedactionLevel::Partial)];

static PRIMARY_TABLE: &[(&str, RedactionLevel)] = &[
    ("abandonedveh", RedactionLevel::Partial),
    ("accidentinjury", RedactionLevel::Partial),
    ("accidentnoninj", RedactionLevel::Normal),
    ("accidentpast", RedactionLevel::Full),
    ("activeviolence", RedactionLevel::Full),
    ("alarmbusiness", RedactionLevel::Partial),
    ("alarmfire", RedactionLevel::Normal),
    ("alarmresidenti", RedactionLevel::Partial),
    ("alchmipmic", RedactionLevel::Full),
    ("alchopenont", RedactionLevel::Full),
    ("alchtransport", RedactionLevel::Full),
    ("animalatlarge", RedactionLevel::Partial),
    ("animalbarking", RedactionLevel::Partial),
    ("animalbite", RedactionLevel::Partial),
    ("animalconfined", RedactionLevel::Partial),
    ("animaldeceased", RedactionLevel::Partial),
    ("animallost", RedactionLevel::Partial),
    ("animalother", RedactionLevel::Partial),
    ("animalvicious", RedactionLevel::Partial),
    ("animalwelfare", RedactionLevel::Partial),
    ("arrest", RedactionLevel::Full),
    ("arson", RedactionLevel::Full),
    ("arsonpast", RedactionLevel::Full),
    ("assault", RedactionLevel::Full),
    ("assaultip", RedactionLevel::Full),
    ("assaultpast", RedactionLevel::Full),
    ("assistcorespo", RedactionLevel::Full),
    ("assistk9", RedactionLevel::Partial),
    ("assistoj", RedactionLevel::Partial),
    ("assistptso", RedactionLevel::Partial),
    ("atlperson", RedactionLevel::Partial),
    ("atlvehicle", RedactionLevel::Partial),
    ("barcheck", RedactionLevel::Partial),
    ("battery", RedactionLevel::Full),
    ("batteryip", RedactionLevel::Full),
    ("batterypast", RedactionLevel::Full),
    ("blackmailextor", RedactionLevel::Full),
    ("bombthrt", RedactionLevel::Full),
    ("bribery", RedactionLevel::Full),
    ("burglary", RedactionLevel::Full),
    ("burglaryip", RedactionLevel::Full),
    ("burglarypast", RedactionLevel::Full),
    ("cdp", RedactionLevel::Full),
    ("cdppast", RedactionLevel::Full),
    ("childabuse", RedactionLevel::Full),
    ("childseat", RedactionLevel::Full),
    ("codeviolation", RedactionLevel::Normal),
    ("communitypres", RedactionLevel::Partial),
    ("contchildmisc", RedactionLevel::Full),
    ("criminalthreat", RedactionLevel::Full),
    ("criminalrestra", RedactionLevel::Partial),
    ("curfewloiterng", RedactionLevel::Partial),
    ("delivermessage", RedactionLevel::Partial),
    ("deprivation", RedactionLevel::Partial),
    ("disabledveh", RedactionLevel::Normal),
    ("disordconduct", RedactionLevel::Full),
    ("disorderlyhous", RedactionLevel::Partial),
    ("distpeacnoise", RedactionLevel::Partial),
    ("domestic", RedactionLevel::Full),
    ("domesticip", RedactionLevel::Full),
    ("domesticpast", RedactionLevel::Full),
    ("drugs", RedactionLevel::Full),
    ("duialcordrug", RedactionLevel::Full),
    ("eavesdropping", RedactionLevel::Full),
    ("embezzlement", RedactionLevel::Full),
    ("escapecust", RedactionLevel::Full),
    ("escapecustwr", RedactionLevel::Full),
    ("escort", RedactionLevel::Partial),
    ("evidence", RedactionLevel::Full),
    ("explosives", RedactionLevel::Partial),
    ("extrapatrol", RedactionLevel::Partial),
    ("falseimperson", RedactionLevel::Partial),
    ("familyother", RedactionLevel::Full),
    ("fileaflserpt", RedactionLevel::Full),
    ("fire", RedactionLevel::Normal),
    ("fireacceptance", RedactionLevel::Normal),
    ("fireaircraft", RedactionLevel::Normal),
    ("fireadvisory", RedactionLevel::Normal),
    ("fireassist", RedactionLevel::Normal),
    ("firebackrescu", RedactionLevel::Normal),
    ("fireconfined", RedactionLevel::Normal),
    ("firedrli", RedactionLevel::Normal),
    ("firedrll", RedactionLevel::Normal),
    ("fireelectrical", RedactionLevel::Normal),
    ("fireelevator", RedactionLevel::Normal),
    ("fireexplosion", RedactionLevel::Normal),
    ("fireextricatio", RedactionLevel::Normal),
    ("firefuelspill", RedactionLevel::Normal),
    ("firegasleak", RedactionLevel::Normal),
    ("firegrassbrus", RedactionLevel::Normal),
    ("firehazmat", RedactionLevel::Normal),
    ("firehighangle", RedactionLevel::Normal),
    ("firelightning", RedactionLevel::Normal),
    ("firelostperso", RedactionLevel::Partial),
    ("firemarine", RedactionLevel::Normal),
    ("firemutualaid", RedactionLevel::Normal),
    ("fireodor", RedactionLevel::Normal),
    ("fireoutside", RedactionLevel::Normal),
    ("fireovercrowd", RedactionLevel::Normal),
    ("firepkgbomb", RedactionLevel::Normal),
    ("firepr", RedactionLevel::Normal),
    ("firesinkeh", RedactionLevel::Normal),
    ("firesmoke", RedactionLevel::Normal),
    ("firestandby", RedactionLevel::Normal),
    ("firestructure", RedactionLevel::Normal),
    ("firetankoutsi", RedactionLevel::Normal),
    ("firetrainfire", RedactionLevel::Normal),
    ("firetraininci", RedactionLevel::Normal),
    ("firevehicle", RedactionLevel::Normal),
    ("firewatercraft", RedactionLevel::Normal),
    ("fireweathisa", RedactionLevel::Normal),
    ("fireworks", RedactionLevel::Normal),
    ("firewtrrescue", RedactionLevel::Normal),
    ("fishgame", RedactionLevel::Partial),
    ("fightip", RedactionLevel::Full),
    ("fightpast", RedactionLevel::Full),
    ("fleeelude", RedactionLevel::Full),
    ("flooding", RedactionLevel::Normal),
    ("footpursuit", RedactionLevel::Full),
    ("forgery", RedactionLevel::Full),
    ("foundproperty", RedactionLevel::Partial),
    ("fraud", RedactionLevel::Full),
    ("furntominors", RedactionLevel::Full),
    ("gambling", RedactionLevel::Full),
    ("homicide", RedactionLevel::Full),
    ("housecheck", RedactionLevel::Partial),
    ("humantrafficki", RedactionLevel::Full),
    ("incest", RedactionLevel::Full),
    ("information", RedactionLevel::Partial),
    ("intimidation", RedactionLevel::Full),
    ("interwchild", RedactionLevel::Full),
    ("investigatehzd", RedactionLevel::Partial),
    ("investigateveh", RedactionLevel::Full),
    ("investreport", RedactionLevel::Partial),
    ("juvenileproblm", RedactionLevel::Normal),
    ("juveniletransp", RedactionLevel::Full),
    ("juvcincoher", RedactionLevel::Full),
    ("juvcincrunawy", RedactionLevel::Full),
    ("kidnapping", RedactionLevel::Full),
    ("kidnappingip", RedactionLevel::Full),
    ("larceny", RedactionLevel::Full),
    ("larcenyeh", RedactionLevel::Full),
    ("larcenyehpast", RedactionLevel::Full),
    ("larcenypast", RedactionLevel::Full),
    ("lewdlascivious", RedactionLevel::Full),
    ("liqlawsother", RedactionLevel::Full),
    ("littering", RedactionLevel::Partial),
    ("lostproperty", RedactionLevel::Partial),
    ("medabdominal", RedactionLevel::Partial),
    ("medacn", RedactionLevel::Partial),
    ("medalergbites", RedactionLevel::Partial),
    ("medanimalbite", RedactionLevel::Partial),
    ("medassault", RedactionLevel::Partial),
    ("medbackpain", RedactionLevel::Partial),
    ("medbreathing", RedactionLevel::Partial),
    ("medburnexplos", RedactionLevel::Partial),
    ("medcardiacres", RedactionLevel::Partial),
    ("medchestpain", RedactionLevel::Partial),
    ("medchoking", RedactionLevel::Partial),
    ("medcrbnmonoxd", RedactionLevel::Partial),
    ("meddiabetic", RedactionLevel::Partial),
    ("meddrowning", RedactionLevel::Partial),
    ("medelectro", RedactionLevel::Partial),
    ("medeyeproblem", RedactionLevel::Partial),
    ("medfall", RedactionLevel::Partial),
    ("medflight", RedactionLevel::Partial),
    ("medheadache", RedactionLevel::Partial),
    ("medheartprob", RedactionLevel::Partial),
    ("medheatcold", RedactionLevel::Partial),
    ("medhemorrhage", RedactionLevel::Partial),
    ("medliftassist", RedactionLevel::Partial),
    ("medobstetrical", RedactionLevel::Partial),
    ("medoj", RedactionLevel::Partial),
    ("medotrentrap", RedactionLevel::Full),
    ("medoverdose", RedactionLevel::Full),
    ("medpr", RedactionLevel::Full),
    ("medpsychiatric", RedactionLevel::Full),
    ("medseizure", RedactionLevel::Partial),
    ("medsickperson", RedactionLevel::Partial),
    ("medstabgunsht", RedactionLevel::Full),
    ("medstandby", RedactionLevel::Partial),
    ("medstrokecva", RedactionLevel::Partial),
    ("medtransfer", RedactionLevel::Partial),
    ("medtraumaoth", RedactionLevel::Partial),
    ("medunconscious", RedactionLevel::Partial),
    ("medunknown", RedactionLevel::Partial),
    ("medicalother", RedactionLevel::Partial),
    ("mhp", RedactionLevel::Full),
    ("miscordresol", RedactionLevel::Full),
    ("missingperson", RedactionLevel::Partial),
    ("mjreports", RedactionLevel::Full),
    ("motoristassist", RedactionLevel::Partial),
    ("obscenity", RedactionLevel::Full),
    ("offenderregist", RedactionLevel::Full),
    ("ojreports", RedactionLevel::Full),
    ("ojwarrants", RedactionLevel::Full),
    ("othrtrviol", RedactionLevel::Full),
    ("overcrowding", RedactionLevel::Normal),
    ("parkingauth", RedactionLevel::Partial),
    ("parkingproblem", RedactionLevel::Partial),
    ("pbarctraffic", RedactionLevel::Full),
    ("pbarc2", RedactionLevel::Full),
    ("pbburgprevent", RedactionLevel::Full),
    ("pbcaseofplac", RedactionLevel::Full),
    ("pbcitizenexch", RedactionLevel::Full),
    ("pbgeneralplay", RedactionLevel::Full),
    ("pblaserpoint", RedactionLevel::Partial),
    ("pblarcmvprev", RedactionLevel::Full),
    ("pblpr", RedactionLevel::Full),
    ("pbpreventpart", RedactionLevel::Full),
    ("pbrepeatoffdr", RedactionLevel::Full),
    ("pbverkada", RedactionLevel::Full),
    ("pbwarrant", RedactionLevel::Full),
    ("perjury", RedactionLevel::Partial),
    ("phoneharrasmnt", RedactionLevel::Full),
    ("prostitution", RedactionLevel::Full),
    ("protectcustody", RedactionLevel::Partial),
    ("publiccontact", RedactionLevel::Partial),
    ("publicinjury", RedactionLevel::Partial),
    ("publicservice", RedactionLevel::Partial),
    ("rape", RedactionLevel::Full),
    ("rapeip", RedactionLevel::Full),
    ("rapepast", RedactionLevel::Full),
    ("recklessdrive", RedactionLevel::Full),
    ("recoveredprop", RedactionLevel::Partial),
    ("repossesedprop", RedactionLevel::Partial),
    ("resisting", RedactionLevel::Partial),
    ("riotulawasbly", RedactionLevel::Full),
    ("robbery", RedactionLevel::Full),
    ("robberyip", RedactionLevel::Full),
    ("robberypast", RedactionLevel::Full),
    ("searchwarrant", RedactionLevel::Partial),
    ("sexoffense", RedactionLevel::Full),
    ("shotsfired", RedactionLevel::Full),
    ("shotsheard", RedactionLevel::Full),
    ("smokingviol", RedactionLevel::Full),
    ("speakwaw", RedactionLevel::Partial),
    ("speakwcalltk", RedactionLevel::Full),
    ("speakwofc", RedactionLevel::Full),
    ("stalking", RedactionLevel::Full),
    ("standby", RedactionLevel::Partial),
    ("stolenproperty", RedactionLevel::Full),
    ("stolenveh", RedactionLevel::Full),
    ("stolenvehpast", RedactionLevel::Full),
    ("suicide", RedactionLevel::Full),
    ("supplement", RedactionLevel::Partial),
    ("suspicion", RedactionLevel::Partial),
    ("suscancrevdl", RedactionLevel::Full),
    ("testingcall", RedactionLevel::Partial),
    ("tobaccoproblem", RedactionLevel::Partial),
    ("tow", RedactionLevel::Partial),
    ("trafficadvisry", RedactionLevel::Partial),
    ("traffichazard", RedactionLevel::Normal),
    ("trafficstop", RedactionLevel::Full),
    ("transport", RedactionLevel::Full),
    ("trespass", RedactionLevel::Full),
    ("trfdevmalf", RedactionLevel::Partial),
    ("trfdvcmissing", RedactionLevel::Partial),
    ("unatendeeath", RedactionLevel::Full),
    ("unlawusedlid", RedactionLevel::Full),
    ("unwantedsubj", RedactionLevel::Partial),
    ("unsecurepremis", RedactionLevel::Partial),
    ("urinateinpub", RedactionLevel::Partial),
    ("utilityproblem", RedactionLevel::Partial),
    ("vehhomicide", RedactionLevel::Full),
    ("verbalargument", RedactionLevel::Full),
    ("violcrtorder", RedactionLevel::Full),
    ("warrant", RedactionLevel::Full),
    ("wateremergency", RedactionLevel::Partial),
    ("weaponviol", RedactionLevel::Full),
    ("welfarecheck", RedactionLevel::Partial),
    ("windowpeeping", RedactionLevel::Full),
    ("wpncontjail", RedactionLevel::Full),
    ("48hrsanction", RedactionLevel::Partial),
];

// ============================================================================
// LEVEL RESOLUTION
// ============================================================================

/// Canonicalize a descriptor: lowercase, non-alphanumerics removed
pub fn clean_descriptor(descriptor: &str) -> String {
    descriptor
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Resolve the redaction level for a descriptor
///
/// The primary table is consulted first with an exact match on the
/// cleaned key. If that yields Normal (explicit or absent), the secondary
/// substring table is consulted in order.
pub fn resolve_level(descriptor: &str) -> RedactionLevel {
    let clean = clean_descriptor(descriptor);

    let level = PRIMARY_REDACTION
        .get(clean.as_str())
        .copied()
        .unwrap_or(RedactionLevel::Normal);

    if level != RedactionLevel::Normal {
        return level;
    }

    for (key, secondary_level) in SECONDARY_REDACTION {
        if clean.contains(key) {
            return *secondary_level;
        }
    }

    level
}

// ============================================================================
// APPLICATION
// ============================================================================

/// Redact an alert at the level derived from its descriptor
///
/// The returned alert is fully independent of the input.
pub fn redact_alert(alert: &Alert) -> Alert {
    let level = resolve_level(alert.alert.description.as_deref().unwrap_or(""));
    redact_alert_with_level(alert, level)
}

/// Redact an alert at an explicit level
pub fn redact_alert_with_level(alert: &Alert, level: RedactionLevel) -> Alert {
    let mut redacted = alert.clone();
    let details = &mut redacted.alert;

    match level {
        RedactionLevel::Normal => {
            clear_opt_string(&mut details.details);
        }
        RedactionLevel::Partial => {
            clear_opt_string(&mut details.details);

            clear_opt_string(&mut details.cross_street);
            clear_opt_string(&mut details.map_address);
            clear_opt_string(&mut details.place);
            clear_opt_string(&mut details.dispatch_coords);
            clear_opt_string(&mut details.city);
            clear_opt_string(&mut details.state);
            clear_opt_string(&mut details.coordinate_source);
            details.lat = 0.0;
            details.lon = 0.0;
        }
        RedactionLevel::Full => {
            // Preserve only id, stamp, and status
            clear_opt_string(&mut details.city);
            clear_opt_string(&mut details.coordinate_source);
            clear_opt_string(&mut details.cross_street);
            clear_opt_string(&mut details.custom_identifiers);
            clear_opt_string(&mut details.description);
            clear_opt_string(&mut details.details);
            clear_opt_string(&mut details.dispatch_coords);
            clear_opt_string(&mut details.map_address);
            clear_opt_string(&mut details.map_code);
            clear_opt_string(&mut details.place);
            clear_opt_string(&mut details.priority);
            clear_opt_string(&mut details.received);
            clear_opt_string(&mut details.source);
            clear_opt_string(&mut details.state);
            clear_opt_string(&mut details.unit);
            clear_opt_string(&mut details.units);
            details.pagegroups.clear();
            details.lat = 0.0;
            details.lon = 0.0;
        }
    }

    redacted
}

/// Overwrite the target of a present optional string; absent stays absent
fn clear_opt_string(field: &mut Option<String>) {
    if let Some(value) = field {
        *value = REDACTED.to_string();
    }
}
