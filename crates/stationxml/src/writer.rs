//! Inventory → StationXML.

use quick_xml::escape::escape;

use aqms_common::{
    format_timestamp, Channel, Inventory, Network, Response, ResponseStage, StageTransfer,
    Station, Timestamp,
};

/// Render an inventory as a StationXML 1.1 document.
pub fn write_inventory(inventory: &Inventory) -> String {
    let mut xml = String::new();

    xml.push_str(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<FDSNStationXML xmlns="http://www.fdsn.org/xml/station/1" schemaVersion="1.1">
"#,
    );
    xml.push_str(&format!(
        "  <Source>{}</Source>\n",
        escape(inventory.source.as_deref().unwrap_or("AQMS"))
    ));
    if let Some(sender) = &inventory.sender {
        xml.push_str(&format!("  <Sender>{}</Sender>\n", escape(sender)));
    }
    if let Some(created) = &inventory.created {
        xml.push_str(&format!(
            "  <Created>{}</Created>\n",
            format_timestamp(created)
        ));
    }

    for network in &inventory.networks {
        write_network(&mut xml, network);
    }

    xml.push_str("</FDSNStationXML>\n");
    xml
}

fn dates(start: Option<Timestamp>, end: Option<Timestamp>) -> String {
    let mut attrs = String::new();
    if let Some(start) = start {
        attrs.push_str(&format!(r#" startDate="{}""#, format_timestamp(&start)));
    }
    if let Some(end) = end {
        attrs.push_str(&format!(r#" endDate="{}""#, format_timestamp(&end)));
    }
    attrs
}

fn write_network(xml: &mut String, network: &Network) {
    xml.push_str(&format!(
        "  <Network code=\"{}\"{}>\n",
        escape(&network.code),
        dates(network.start_date, network.end_date)
    ));
    if let Some(description) = &network.description {
        xml.push_str(&format!(
            "    <Description>{}</Description>\n",
            escape(description)
        ));
    }
    for station in &network.stations {
        write_station(xml, station);
    }
    xml.push_str("  </Network>\n");
}

fn write_station(xml: &mut String, station: &Station) {
    xml.push_str(&format!(
        "    <Station code=\"{}\"{}>\n",
        escape(&station.code),
        dates(station.start_date, station.end_date)
    ));
    xml.push_str(&format!(
        r#"      <Latitude>{}</Latitude>
      <Longitude>{}</Longitude>
      <Elevation>{}</Elevation>
"#,
        station.latitude, station.longitude, station.elevation
    ));
    if let Some(name) = &station.site_name {
        xml.push_str(&format!(
            "      <Site>\n        <Name>{}</Name>\n      </Site>\n",
            escape(name)
        ));
    }
    for channel in &station.channels {
        write_channel(xml, channel);
    }
    xml.push_str("    </Station>\n");
}

fn write_channel(xml: &mut String, channel: &Channel) {
    xml.push_str(&format!(
        "      <Channel code=\"{}\" locationCode=\"{}\"{}>\n",
        escape(&channel.code),
        escape(&channel.location_code),
        dates(channel.start_date, channel.end_date)
    ));
    xml.push_str(&format!(
        r#"        <Latitude>{}</Latitude>
        <Longitude>{}</Longitude>
        <Elevation>{}</Elevation>
        <Depth>{}</Depth>
"#,
        channel.latitude, channel.longitude, channel.elevation, channel.depth
    ));
    if let Some(azimuth) = channel.azimuth {
        xml.push_str(&format!("        <Azimuth>{}</Azimuth>\n", azimuth));
    }
    if let Some(dip) = channel.dip {
        xml.push_str(&format!("        <Dip>{}</Dip>\n", dip));
    }
    xml.push_str(&format!(
        "        <SampleRate>{}</SampleRate>\n",
        channel.sample_rate
    ));
    if let Some(format) = &channel.storage_format {
        xml.push_str(&format!(
            "        <StorageFormat>{}</StorageFormat>\n",
            escape(format)
        ));
    }
    if let Some(units) = &channel.calibration_units {
        xml.push_str(&format!(
            "        <CalibrationUnits>\n          <Name>{}</Name>\n        </CalibrationUnits>\n",
            escape(units)
        ));
    }
    if let Some(sensor) = &channel.sensor {
        xml.push_str(&format!(
            "        <Sensor>\n          <Description>{}</Description>\n        </Sensor>\n",
            escape(sensor)
        ));
    }
    if let Some(response) = &channel.response {
        write_response(xml, response);
    }
    xml.push_str("      </Channel>\n");
}

fn units(indent: &str, input: &str, output: &str) -> String {
    format!(
        "{i}<InputUnits>\n{i}  <Name>{}</Name>\n{i}</InputUnits>\n{i}<OutputUnits>\n{i}  <Name>{}</Name>\n{i}</OutputUnits>\n",
        escape(input),
        escape(output),
        i = indent
    )
}

fn write_response(xml: &mut String, response: &Response) {
    xml.push_str("        <Response>\n");
    if let Some(s) = &response.instrument_sensitivity {
        xml.push_str(&format!(
            "          <InstrumentSensitivity>\n            <Value>{}</Value>\n            <Frequency>{}</Frequency>\n",
            s.value, s.frequency
        ));
        xml.push_str(&units("            ", &s.input_units, &s.output_units));
        xml.push_str("          </InstrumentSensitivity>\n");
    }
    for stage in &response.stages {
        write_stage(xml, stage);
    }
    xml.push_str("        </Response>\n");
}

fn write_stage(xml: &mut String, stage: &ResponseStage) {
    const I: &str = "              ";

    xml.push_str(&format!("          <Stage number=\"{}\">\n", stage.number));
    match &stage.transfer {
        StageTransfer::PolesZeros(pz) => {
            xml.push_str("            <PolesZeros>\n");
            xml.push_str(&units(I, &stage.input_units, &stage.output_units));
            xml.push_str(&format!(
                "{I}<PzTransferFunctionType>{}</PzTransferFunctionType>\n{I}<NormalizationFactor>{}</NormalizationFactor>\n{I}<NormalizationFrequency>{}</NormalizationFrequency>\n",
                escape(&pz.transfer_function_type),
                pz.normalization_factor,
                pz.normalization_frequency
            ));
            for (n, z) in pz.zeros.iter().enumerate() {
                xml.push_str(&format!(
                    "{I}<Zero number=\"{}\">\n{I}  <Real>{}</Real>\n{I}  <Imaginary>{}</Imaginary>\n{I}</Zero>\n",
                    n, z.re, z.im
                ));
            }
            for (n, p) in pz.poles.iter().enumerate() {
                xml.push_str(&format!(
                    "{I}<Pole number=\"{}\">\n{I}  <Real>{}</Real>\n{I}  <Imaginary>{}</Imaginary>\n{I}</Pole>\n",
                    n, p.re, p.im
                ));
            }
            xml.push_str("            </PolesZeros>\n");
        }
        StageTransfer::Coefficients(cf) => {
            xml.push_str("            <Coefficients>\n");
            xml.push_str(&units(I, &stage.input_units, &stage.output_units));
            xml.push_str(&format!(
                "{I}<CfTransferFunctionType>{}</CfTransferFunctionType>\n",
                escape(&cf.transfer_function_type)
            ));
            for n in &cf.numerators {
                xml.push_str(&format!("{I}<Numerator>{}</Numerator>\n", n));
            }
            for d in &cf.denominators {
                xml.push_str(&format!("{I}<Denominator>{}</Denominator>\n", d));
            }
            xml.push_str("            </Coefficients>\n");
        }
        StageTransfer::Fir(fir) => {
            xml.push_str("            <FIR>\n");
            xml.push_str(&units(I, &stage.input_units, &stage.output_units));
            xml.push_str(&format!(
                "{I}<Symmetry>{}</Symmetry>\n",
                escape(&fir.symmetry)
            ));
            for (i, c) in fir.coefficients.iter().enumerate() {
                xml.push_str(&format!(
                    "{I}<NumeratorCoefficient i=\"{}\">{}</NumeratorCoefficient>\n",
                    i, c
                ));
            }
            xml.push_str("            </FIR>\n");
        }
        StageTransfer::GainOnly => {}
    }
    if let Some(d) = &stage.decimation {
        xml.push_str(&format!(
            r#"            <Decimation>
              <InputSampleRate>{}</InputSampleRate>
              <Factor>{}</Factor>
              <Offset>{}</Offset>
              <Delay>{}</Delay>
              <Correction>{}</Correction>
            </Decimation>
"#,
            d.input_sample_rate, d.factor, d.offset, d.delay, d.correction
        ));
    }
    xml.push_str(&format!(
        "            <StageGain>\n              <Value>{}</Value>\n              <Frequency>{}</Frequency>\n            </StageGain>\n",
        stage.gain, stage.gain_frequency
    ));
    xml.push_str("          </Stage>\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read_inventory;
    use test_utils::fixtures;

    #[test]
    fn test_written_document_reads_back() {
        let inventory = fixtures::uw_ratt_inventory();
        let xml = write_inventory(&inventory);
        let parsed = read_inventory(&xml).unwrap();
        assert_eq!(parsed.networks, inventory.networks);
    }

    #[test]
    fn test_special_characters_escaped() {
        let mut inventory = fixtures::uw_ratt_inventory();
        inventory.networks[0].description = Some("Seismic <Net> & Co".into());
        let xml = write_inventory(&inventory);
        assert!(xml.contains("Seismic &lt;Net&gt; &amp; Co"));
        let parsed = read_inventory(&xml).unwrap();
        assert_eq!(
            parsed.networks[0].description.as_deref(),
            Some("Seismic <Net> & Co")
        );
    }

    #[test]
    fn test_open_epoch_has_no_end_date() {
        let xml = write_inventory(&fixtures::uw_ratt_inventory());
        assert!(xml.contains(r#"<Channel code="EHZ" locationCode="" startDate="2010-01-01T00:00:00Z">"#));
        assert!(!xml.contains("endDate"));
    }
}
