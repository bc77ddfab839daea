use super::Angle;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

impl Serialize for Angle {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(self.radians())
    }
}

impl<'de> Deserialize<'de> for Angle {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let r = f64::deserialize(d)?;
        if !r.is_finite() {
            return Err(serde::de::Error::custom("angle must be finite"));
        }
        Ok(Angle::from_radians(r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_radians() {
        let json = serde_json::to_string(&Angle::from_radians(0.5)).unwrap();
        assert_eq!(json, "0.5");
        let back: Angle = serde_json::from_str("0.25").unwrap();
        assert_eq!(back.radians(), 0.25);
    }
}
