//! StationXML → Inventory.
//!
//! The document is first read into a small element tree with quick-xml's
//! event reader, then walked into the inventory types.

use std::str::FromStr;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use aqms_common::{
    parse_timestamp, Channel, Coefficients, Complex, Decimation, Fir, Inventory, Network,
    PolesZeros, Response, ResponseStage, Sensitivity, StageTransfer, Station, Timestamp,
};

use crate::error::{StationXmlError, StationXmlResult};

/// A parsed XML element. Namespace prefixes are dropped.
#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn from_start(e: &BytesStart<'_>, position: usize) -> StationXmlResult<Self> {
        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| StationXmlError::Xml {
                position,
                source: quick_xml::Error::InvalidAttr(err),
            })?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|source| StationXmlError::Xml { position, source })?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
            attributes,
            ..Default::default()
        })
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }
}

/// Parse a StationXML document.
pub fn read_inventory(xml: &str) -> StationXmlResult<Inventory> {
    let root = parse_tree(xml)?;
    if root.name != "FDSNStationXML" {
        return Err(StationXmlError::UnexpectedRoot(root.name));
    }

    let networks = root
        .children("Network")
        .map(read_network)
        .collect::<StationXmlResult<Vec<_>>>()?;

    let inventory = Inventory {
        source: root.child_text("Source").map(str::to_string),
        sender: root.child_text("Sender").map(str::to_string),
        created: root
            .child_text("Created")
            .map(|t| timestamp("FDSNStationXML", "Created", t))
            .transpose()?,
        networks,
    };

    debug!(
        networks = inventory.networks.len(),
        stations = inventory.station_count(),
        channels = inventory.channel_count(),
        "Parsed StationXML"
    );
    Ok(inventory)
}

fn parse_tree(xml: &str) -> StationXmlResult<Element> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let position = reader.buffer_position();
        let event = reader
            .read_event()
            .map_err(|source| StationXmlError::Xml { position, source })?;
        match event {
            Event::Start(e) => stack.push(Element::from_start(&e, position)?),
            Event::Empty(e) => {
                let element = Element::from_start(&e, position)?;
                attach(&mut stack, &mut root, element);
            }
            Event::Text(t) => {
                if let Some(current) = stack.last_mut() {
                    let text = t
                        .unescape()
                        .map_err(|source| StationXmlError::Xml { position, source })?;
                    current.text.push_str(&text);
                }
            }
            Event::CData(t) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(StationXmlError::Unterminated(open.name));
    }
    root.ok_or_else(|| StationXmlError::missing("document", "root element"))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

fn read_network(e: &Element) -> StationXmlResult<Network> {
    let code = required_attr(e, "Network", "code")?;
    let context = format!("Network {}", code);
    Ok(Network {
        code: code.to_string(),
        description: e.child_text("Description").map(str::to_string),
        start_date: optional_timestamp(e, &context, "startDate")?,
        end_date: optional_timestamp(e, &context, "endDate")?,
        stations: e
            .children("Station")
            .map(|s| read_station(s, code))
            .collect::<StationXmlResult<Vec<_>>>()?,
    })
}

fn read_station(e: &Element, net: &str) -> StationXmlResult<Station> {
    let code = required_attr(e, &format!("Network {} Station", net), "code")?;
    let context = format!("Station {}.{}", net, code);
    Ok(Station {
        code: code.to_string(),
        start_date: optional_timestamp(e, &context, "startDate")?,
        end_date: optional_timestamp(e, &context, "endDate")?,
        latitude: required_number(e, &context, "Latitude")?,
        longitude: required_number(e, &context, "Longitude")?,
        elevation: required_number(e, &context, "Elevation")?,
        site_name: e
            .child("Site")
            .and_then(|site| site.child_text("Name"))
            .map(str::to_string),
        channels: e
            .children("Channel")
            .map(|c| read_channel(c, &context))
            .collect::<StationXmlResult<Vec<_>>>()?,
    })
}

fn read_channel(e: &Element, station: &str) -> StationXmlResult<Channel> {
    let code = required_attr(e, station, "code")?;
    let location = e.attr("locationCode").unwrap_or("");
    let context = format!("{} Channel {}.{}", station, location, code);

    let sample_rate = match e.child_text("SampleRate") {
        Some(t) => number(&context, "SampleRate", t)?,
        None => 0.0,
    };

    Ok(Channel {
        code: code.to_string(),
        location_code: location.to_string(),
        start_date: optional_timestamp(e, &context, "startDate")?,
        end_date: optional_timestamp(e, &context, "endDate")?,
        latitude: required_number(e, &context, "Latitude")?,
        longitude: required_number(e, &context, "Longitude")?,
        elevation: required_number(e, &context, "Elevation")?,
        depth: optional_number(e, &context, "Depth")?.unwrap_or(0.0),
        azimuth: optional_number(e, &context, "Azimuth")?,
        dip: optional_number(e, &context, "Dip")?,
        sample_rate,
        sensor: e
            .child("Sensor")
            .and_then(|s| s.child_text("Description").or_else(|| s.child_text("Type")))
            .map(str::to_string),
        calibration_units: e
            .child("CalibrationUnits")
            .and_then(|u| u.child_text("Name"))
            .map(str::to_string),
        storage_format: e.child_text("StorageFormat").map(str::to_string),
        response: e
            .child("Response")
            .map(|r| read_response(r, &context))
            .transpose()?,
    })
}

fn read_response(e: &Element, channel: &str) -> StationXmlResult<Response> {
    let instrument_sensitivity = match e.child("InstrumentSensitivity") {
        Some(s) => {
            let context = format!("{} InstrumentSensitivity", channel);
            Some(Sensitivity {
                value: required_number(s, &context, "Value")?,
                frequency: required_number(s, &context, "Frequency")?,
                input_units: units(s, &context, "InputUnits")?,
                output_units: units(s, &context, "OutputUnits")?,
            })
        }
        None => None,
    };

    let mut stages = Vec::new();
    let mut previous_output: Option<String> = None;
    for stage in e.children("Stage") {
        let stage = read_stage(stage, channel, previous_output.as_deref())?;
        previous_output = Some(stage.output_units.clone());
        stages.push(stage);
    }

    Ok(Response {
        instrument_sensitivity,
        stages,
    })
}

/// Read one stage. A gain-only stage carries no units of its own and
/// passes through the previous stage's output units.
fn read_stage(
    e: &Element,
    channel: &str,
    previous_output: Option<&str>,
) -> StationXmlResult<ResponseStage> {
    let number_attr = required_attr(e, channel, "number")?;
    let context = format!("{} Stage {}", channel, number_attr);
    let number: u32 = parse(&context, "number", number_attr)?;

    let (gain, gain_frequency) = match e.child("StageGain") {
        Some(g) => (
            required_number(g, &context, "Value")?,
            required_number(g, &context, "Frequency")?,
        ),
        None => return Err(StationXmlError::missing(context, "StageGain")),
    };

    let (transfer, body) = if let Some(pz) = e.child("PolesZeros") {
        let transfer = StageTransfer::PolesZeros(PolesZeros {
            transfer_function_type: required_text(pz, &context, "PzTransferFunctionType")?,
            normalization_factor: optional_number(pz, &context, "NormalizationFactor")?
                .unwrap_or(1.0),
            normalization_frequency: optional_number(pz, &context, "NormalizationFrequency")?
                .unwrap_or(gain_frequency),
            zeros: pz
                .children("Zero")
                .map(|z| complex(z, &context))
                .collect::<StationXmlResult<Vec<_>>>()?,
            poles: pz
                .children("Pole")
                .map(|p| complex(p, &context))
                .collect::<StationXmlResult<Vec<_>>>()?,
        });
        (transfer, Some(pz))
    } else if let Some(cf) = e.child("Coefficients") {
        let transfer = StageTransfer::Coefficients(Coefficients {
            transfer_function_type: required_text(cf, &context, "CfTransferFunctionType")?,
            numerators: numbers(cf, &context, "Numerator")?,
            denominators: numbers(cf, &context, "Denominator")?,
        });
        (transfer, Some(cf))
    } else if let Some(fir) = e.child("FIR") {
        let transfer = StageTransfer::Fir(Fir {
            symmetry: required_text(fir, &context, "Symmetry")?,
            coefficients: numbers(fir, &context, "NumeratorCoefficient")?,
        });
        (transfer, Some(fir))
    } else {
        (StageTransfer::GainOnly, None)
    };

    let (input_units, output_units) = match body {
        Some(body) => (
            units(body, &context, "InputUnits")?,
            units(body, &context, "OutputUnits")?,
        ),
        None => {
            let passthrough = previous_output
                .ok_or_else(|| StationXmlError::missing(context.clone(), "InputUnits"))?;
            (passthrough.to_string(), passthrough.to_string())
        }
    };

    let decimation = match e.child("Decimation") {
        Some(d) => Some(Decimation {
            input_sample_rate: required_number(d, &context, "InputSampleRate")?,
            factor: parse(&context, "Factor", &required_text(d, &context, "Factor")?)?,
            offset: parse(&context, "Offset", &required_text(d, &context, "Offset")?)?,
            delay: required_number(d, &context, "Delay")?,
            correction: required_number(d, &context, "Correction")?,
        }),
        None => None,
    };

    Ok(ResponseStage {
        number,
        gain,
        gain_frequency,
        input_units,
        output_units,
        transfer,
        decimation,
    })
}

fn complex(e: &Element, context: &str) -> StationXmlResult<Complex> {
    Ok(Complex {
        re: required_number(e, context, "Real")?,
        im: required_number(e, context, "Imaginary")?,
    })
}

fn units(e: &Element, context: &str, name: &str) -> StationXmlResult<String> {
    e.child(name)
        .and_then(|u| u.child_text("Name"))
        .map(str::to_string)
        .ok_or_else(|| StationXmlError::missing(context, format!("{}/Name", name)))
}

fn required_attr<'a>(e: &'a Element, context: &str, name: &str) -> StationXmlResult<&'a str> {
    e.attr(name)
        .ok_or_else(|| StationXmlError::missing(format!("{} <{}>", context, e.name), name))
}

fn required_text(e: &Element, context: &str, name: &str) -> StationXmlResult<String> {
    e.child_text(name)
        .map(str::to_string)
        .ok_or_else(|| StationXmlError::missing(context, name))
}

fn required_number(e: &Element, context: &str, name: &str) -> StationXmlResult<f64> {
    let text = e
        .child_text(name)
        .ok_or_else(|| StationXmlError::missing(context, name))?;
    number(context, name, text)
}

fn optional_number(e: &Element, context: &str, name: &str) -> StationXmlResult<Option<f64>> {
    e.child_text(name).map(|t| number(context, name, t)).transpose()
}

fn numbers(e: &Element, context: &str, name: &str) -> StationXmlResult<Vec<f64>> {
    e.children(name).map(|c| number(context, name, &c.text)).collect()
}

fn number(context: &str, field: &str, text: &str) -> StationXmlResult<f64> {
    parse(context, field, text)
}

fn parse<T>(context: &str, field: &str, text: &str) -> StationXmlResult<T>
where
    T: FromStr,
    T::Err: ToString,
{
    text.trim()
        .parse::<T>()
        .map_err(|e| StationXmlError::invalid(context, field, text, e))
}

fn optional_timestamp(
    e: &Element,
    context: &str,
    name: &str,
) -> StationXmlResult<Option<Timestamp>> {
    e.attr(name).map(|t| timestamp(context, name, t)).transpose()
}

fn timestamp(context: &str, field: &str, text: &str) -> StationXmlResult<Timestamp> {
    parse_timestamp(text).map_err(|e| StationXmlError::invalid(context, field, text, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<FDSNStationXML xmlns="http://www.fdsn.org/xml/station/1" schemaVersion="1.1">
  <Source>PNSN</Source>
  <Created>2024-01-01T00:00:00Z</Created>
  <Network code="UW" startDate="1980-01-01T00:00:00Z">
    <Description>Pacific Northwest &amp; more</Description>
    <Station code="RATT" startDate="2010-01-01T00:00:00Z">
      <Latitude>46.3871</Latitude>
      <Longitude>-119.5913</Longitude>
      <Elevation>1050</Elevation>
      <Site><Name>Rattlesnake Mountain, WA</Name></Site>
      <Channel code="EHZ" locationCode="" startDate="2010-01-01T00:00:00Z">
        <Latitude>46.3871</Latitude>
        <Longitude>-119.5913</Longitude>
        <Elevation>1050</Elevation>
        <Depth>0</Depth>
        <SampleRate>100</SampleRate>
      </Channel>
    </Station>
  </Network>
</FDSNStationXML>
"#;

    #[test]
    fn test_minimal_document() {
        let inventory = read_inventory(MINIMAL).unwrap();
        assert_eq!(inventory.source.as_deref(), Some("PNSN"));
        let network = &inventory.networks[0];
        assert_eq!(network.code, "UW");
        assert_eq!(
            network.description.as_deref(),
            Some("Pacific Northwest & more")
        );
        let station = &network.stations[0];
        assert_eq!(station.site_name.as_deref(), Some("Rattlesnake Mountain, WA"));
        let channel = &station.channels[0];
        assert_eq!(channel.code, "EHZ");
        assert_eq!(channel.location_code, "");
        assert_eq!(channel.end_date, None);
        assert_eq!(channel.azimuth, None);
        assert!(channel.response.is_none());
    }

    #[test]
    fn test_wrong_root_rejected() {
        let err = read_inventory("<Inventory/>").unwrap_err();
        assert!(matches!(err, StationXmlError::UnexpectedRoot(name) if name == "Inventory"));
    }

    #[test]
    fn test_missing_latitude_named() {
        let xml = MINIMAL.replace("<Latitude>46.3871</Latitude>\n      <Longitude>", "<Longitude>");
        let err = read_inventory(&xml).unwrap_err();
        match err {
            StationXmlError::Missing { context, field } => {
                assert_eq!(context, "Station UW.RATT");
                assert_eq!(field, "Latitude");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_number_named() {
        let xml = MINIMAL.replace("<SampleRate>100</SampleRate>", "<SampleRate>fast</SampleRate>");
        let err = read_inventory(&xml).unwrap_err();
        assert!(matches!(err, StationXmlError::InvalidValue { field, .. } if field == "SampleRate"));
    }

    #[test]
    fn test_unterminated_document() {
        let err = read_inventory("<FDSNStationXML><Network code=\"UW\">").unwrap_err();
        assert!(matches!(err, StationXmlError::Unterminated(_) | StationXmlError::Xml { .. }));
    }

    #[test]
    fn test_gain_only_stage_passes_units_through() {
        let xml = r#"<FDSNStationXML>
  <Network code="UW">
    <Station code="RATT" startDate="2010-01-01">
      <Latitude>46</Latitude><Longitude>-119</Longitude><Elevation>0</Elevation>
      <Channel code="EHZ" locationCode="01" startDate="2010-01-01">
        <Latitude>46</Latitude><Longitude>-119</Longitude><Elevation>0</Elevation>
        <Response>
          <Stage number="1">
            <Coefficients>
              <InputUnits><Name>V</Name></InputUnits>
              <OutputUnits><Name>COUNTS</Name></OutputUnits>
              <CfTransferFunctionType>DIGITAL</CfTransferFunctionType>
              <Numerator>1</Numerator>
            </Coefficients>
            <StageGain><Value>419430</Value><Frequency>5</Frequency></StageGain>
          </Stage>
          <Stage number="2">
            <StageGain><Value>2</Value><Frequency>5</Frequency></StageGain>
          </Stage>
        </Response>
      </Channel>
    </Station>
  </Network>
</FDSNStationXML>"#;
        let inventory = read_inventory(xml).unwrap();
        let channel = &inventory.networks[0].stations[0].channels[0];
        assert_eq!(channel.location_code, "01");
        let stages = &channel.response.as_ref().unwrap().stages;
        assert_eq!(stages[1].transfer, StageTransfer::GainOnly);
        assert_eq!(stages[1].input_units, "COUNTS");
        assert_eq!(stages[1].output_units, "COUNTS");
    }
}
